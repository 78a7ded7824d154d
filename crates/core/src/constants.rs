/// Constants used throughout the delaybatch codebase
use std::time::Duration;

// Window bounds
pub const MAX_BATCH_SIZE: usize = 1024;
pub const MIN_WINDOW: Duration = Duration::from_millis(1);
pub const MAX_WINDOW: Duration = Duration::from_secs(10);

// Defaults
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(50);
pub const DEFAULT_MAX_BATCH_SIZE: usize = 64;
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;
pub const DEFAULT_WORKER_THREADS: usize = 4;
pub const DEFAULT_DEDUPLICATE: bool = true;

// Largest argument tuple supported by `Arguments`
pub const MAX_ARITY: usize = 6;

// Environment variable names
pub const DELAYBATCH_LOG_VAR: &str = "DELAYBATCH_LOG";
pub const DELAYBATCH_WINDOW_MS_VAR: &str = "DELAYBATCH_WINDOW_MS";
pub const DELAYBATCH_MAX_BATCH_SIZE_VAR: &str = "DELAYBATCH_MAX_BATCH_SIZE";
pub const DELAYBATCH_BUFFER_CAPACITY_VAR: &str = "DELAYBATCH_BUFFER_CAPACITY";
pub const DELAYBATCH_WORKER_THREADS_VAR: &str = "DELAYBATCH_WORKER_THREADS";
pub const DELAYBATCH_DEDUPLICATE_VAR: &str = "DELAYBATCH_DEDUPLICATE";

// Config file location, relative to the user config directory
pub const CONFIG_DIR_NAME: &str = "delaybatch";
pub const CONFIG_FILE_NAME: &str = "config.json";

// Thread names
pub const WORKER_THREAD_PREFIX: &str = "delaybatch-worker";
pub const TIMER_THREAD_NAME: &str = "delaybatch-timer";
