use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("point cloud is empty")]
    EmptyCloud,

    #[error("scalar layer `{0}` not found")]
    MissingLayer(String),

    #[error("scalar layer `{name}` has {actual} values, cloud has {expected} points")]
    LayerLength { name: String, expected: usize, actual: usize },

    #[error("point {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },

    #[error("{count} roof candidates exceed the {max} labels an f32 layer holds exactly")]
    TooManyLabels { count: usize, max: usize },

    #[error("reference points do not span a plane")]
    DegenerateReferencePlane,
}

impl Error {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter { name, reason: reason.into() }
    }
}
