use delaybatch_core::{ConfigSource, Settings};

pub fn execute(settings: &Settings, json: bool) -> eyre::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }

    let source = match &settings.source {
        ConfigSource::Default => "defaults".to_string(),
        ConfigSource::ConfigFile(path) => format!("file {}", path.display()),
        ConfigSource::EnvironmentVariable(name) => format!("environment {name}"),
        ConfigSource::CommandLine => "command line".to_string(),
    };

    println!("window:          {} ms", settings.batch.window.as_millis());
    println!("max batch size:  {}", settings.batch.max_batch_size);
    println!("buffer capacity: {}", settings.batch.buffer_capacity);
    println!("deduplicate:     {}", settings.batch.deduplicate);
    println!("worker threads:  {}", settings.worker_threads);
    println!("source:          {source}");
    Ok(())
}
