use std::io;

/// All error types for the tile assembler.
#[derive(thiserror::Error, Debug)]
pub enum TileError {
    #[error("Input shape error: {0}")]
    InputShape(String),
    #[error("Unresolved parent: instance '{instance}' references unknown parent '{parent}'")]
    UnresolvedParent { instance: String, parent: String },
    #[error("Empty input: {0}")]
    EmptyInput(String),
    #[error("Input error: {0}")]
    Input(String),
    #[error("Output error: {0}")]
    Output(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_strings() {
        let e = TileError::InputShape("index 9 out of range".into());
        assert_eq!(e.to_string(), "Input shape error: index 9 out of range");

        let e = TileError::UnresolvedParent {
            instance: "door".into(),
            parent: "house".into(),
        };
        assert_eq!(
            e.to_string(),
            "Unresolved parent: instance 'door' references unknown parent 'house'"
        );

        let e = TileError::EmptyInput("no meshes".into());
        assert_eq!(e.to_string(), "Empty input: no meshes");

        let e = TileError::Input("bad kml".into());
        assert_eq!(e.to_string(), "Input error: bad kml");

        let e = TileError::Output("disk full".into());
        assert_eq!(e.to_string(), "Output error: disk full");
    }

    #[test]
    fn from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file missing");
        let e: TileError = io_err.into();
        assert!(matches!(e, TileError::Io(_)));
        assert!(e.to_string().contains("file missing"));
    }

    #[test]
    fn from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: TileError = json_err.into();
        assert!(matches!(e, TileError::Json(_)));
    }
}
