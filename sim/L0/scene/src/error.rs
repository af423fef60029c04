//! Error types for scene parsing and composition.

use thiserror::Error;

/// Errors that can occur while reading, composing, or sampling scenes.
#[derive(Debug, Error)]
pub enum SceneError {
    /// XML parsing or writing error.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// The document lacks a section or tag the operation requires.
    #[error("malformed scene: missing {section} in {context}")]
    MalformedScene {
        /// The missing section or marker.
        section: String,
        /// Where the section was expected.
        context: String,
    },

    /// The object scene does not nest its body as `worldbody/body/body`.
    #[error("object body not found: {0}")]
    ObjectBodyNotFound(String),

    /// No body with the requested name exists.
    #[error("body not found: {0}")]
    BodyNotFound(String),

    /// Euler angles or quaternion components are not finite.
    #[error("invalid rotation: {0}")]
    InvalidRotation(String),

    /// Invalid attribute value.
    #[error("invalid value for {attribute} on {element}: {message}")]
    InvalidAttribute {
        /// The attribute with the invalid value.
        attribute: &'static str,
        /// The element containing the attribute.
        element: String,
        /// Description of why the value is invalid.
        message: String,
    },

    /// Reference to an asset that is not declared in the document.
    #[error("reference to undefined {kind} asset: {name} in {context}")]
    DanglingAsset {
        /// Asset kind (`mesh`, `material`, `texture`).
        kind: &'static str,
        /// The asset name that was referenced.
        name: String,
        /// The element holding the reference.
        context: String,
    },

    /// No catalog entry satisfies the filter criteria.
    #[error("no object matches the filter criteria: {0}")]
    NoMatchingObject(String),

    /// Object catalog manifest error.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SceneError {
    /// Create a malformed scene error.
    pub fn malformed(section: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MalformedScene {
            section: section.into(),
            context: context.into(),
        }
    }

    /// Create an invalid attribute error.
    pub fn invalid_attribute(
        attribute: &'static str,
        element: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            attribute,
            element: element.into(),
            message: message.into(),
        }
    }

    /// Create a dangling asset reference error.
    pub fn dangling_asset(
        kind: &'static str,
        name: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::DanglingAsset {
            kind,
            name: name.into(),
            context: context.into(),
        }
    }
}

/// Result type for scene operations.
pub type Result<T> = std::result::Result<T, SceneError>;
