use std::fs;
use std::path::Path;

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::analysis::domain::AbstractDomain;
use crate::error::{EngineError, EngineResult};

/// Encode an abstract state
pub fn encode_state<D: AbstractDomain + Serialize>(state: &D) -> EngineResult<String> {
    serde_json::to_string_pretty(state)
        .map_err(|e| EngineError::CorruptedState(format!("unable to encode {}: {}", state, e)))
}

/// Decode an abstract state, any malformed content is fatal
pub fn decode_state<D: AbstractDomain + DeserializeOwned>(content: &str) -> EngineResult<D> {
    serde_json::from_str(content)
        .map_err(|e| EngineError::CorruptedState(format!("malformed abstract state: {}", e)))
}

/// Persist an abstract state to a file
pub fn save_state<D: AbstractDomain + Serialize>(state: &D, path: &Path) -> EngineResult<()> {
    let content = encode_state(state)?;
    fs::write(path, content).map_err(|e| {
        EngineError::CorruptedState(format!("unable to write {}: {}", path.display(), e))
    })?;
    debug!("abstract state saved to {}", path.display());
    Ok(())
}

/// Restore an abstract state persisted by `save_state`
pub fn load_state<D: AbstractDomain + DeserializeOwned>(path: &Path) -> EngineResult<D> {
    let content = fs::read_to_string(path).map_err(|e| {
        EngineError::CorruptedState(format!("unable to read {}: {}", path.display(), e))
    })?;
    decode_state(&content)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::analysis::interval::{Interval, IntervalState};
    use crate::ir::bridge::expr::Expr;
    use crate::ir::bridge::stmt::Stmt;

    fn sample() -> IntervalState {
        IntervalState::top()
            .interpret(&Stmt::assign("x", Expr::int(3)))
            .interpret(&Stmt::assign("a", Expr::Array(vec![Expr::int(0)])))
    }

    #[test]
    fn state_survives_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = sample();
        save_state(&state, &path).unwrap();
        let restored: IntervalState = load_state(&path).unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.get("a.length"), Interval::constant(1));
    }

    #[test]
    fn bottom_is_persisted_too() {
        let encoded = encode_state(&IntervalState::Bottom).unwrap();
        let decoded: IntervalState = decode_state(&encoded).unwrap();
        assert!(decoded.is_bot());
    }

    #[test]
    fn malformed_content_is_fatal() {
        let result: EngineResult<IntervalState> = decode_state("{\"Env\": {\"x\": [1, 2");
        assert!(matches!(result, Err(EngineError::CorruptedState(_))));

        let result: EngineResult<IntervalState> = decode_state("{\"Env\": {\"x\": \"wide\"}}");
        assert!(matches!(result, Err(EngineError::CorruptedState(_))));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let result: EngineResult<IntervalState> = load_state(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(EngineError::CorruptedState(_))));
    }
}
