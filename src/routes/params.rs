use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Exact category name, e.g. `kitchen`.
    pub category: Option<String>,
    /// Case-insensitive match on title or description.
    pub search: Option<String>,
}
