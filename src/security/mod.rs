pub mod url_validation;

pub use url_validation::{check_url_shape, is_private_host, is_private_ip, validate_public_url};
