use std::env;
use std::path::PathBuf;

use lazy_static::lazy_static;

// common configurations
lazy_static! {
    pub static ref PATH_ROOT: PathBuf = {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        assert!(path.pop());
        path
    };
    pub static ref PATH_STUDIO: PathBuf = match env::var("DAI_STUDIO") {
        Ok(val) if !val.is_empty() => PathBuf::from(val),
        _ => PATH_ROOT.join("studio"),
    };
    pub static ref DEFAULT_SEED: u64 = env::var("DAI_SEED")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(0);
}
