use snafu::Snafu;

/// Errors from parsing network-level values.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum NetworkError {
    /// Text is not a valid `a.b.c.d/len` subnet.
    #[snafu(display("invalid subnet '{input}': {reason}"))]
    InvalidSubnet { input: String, reason: String },

    /// Role name is not one of the known roles.
    #[snafu(display("unknown role '{role}'"))]
    UnknownRole { role: String },

    /// A hex-encoded hash has the wrong length or alphabet.
    #[snafu(display("invalid hash '{input}': {reason}"))]
    InvalidHash { input: String, reason: String },
}
