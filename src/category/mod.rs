//! Categories for grouping transactions.

mod db;
mod domain;
mod endpoints;

pub use db::{
    create_category, create_category_table, delete_category, get_all_categories, get_category,
    update_category,
};
pub(crate) use db::{release_category_names, upsert_category};
pub(crate) use domain::deserialize_some;
pub use domain::{Category, CategoryId, CategoryName, CategoryUpdate, HexColor, NewCategory};
pub use endpoints::{
    create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
    get_category_endpoint, update_category_endpoint,
};
