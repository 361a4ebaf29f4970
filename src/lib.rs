pub mod catalog;
pub mod database_ops;
pub mod error;
pub mod logging;
pub mod normalization;

pub mod util {
    pub mod env;
}

pub use catalog::filters::{
    catalog_index, clamp_price, filter_and_sort, group_by_category, price_bounds, similar,
    slider_step, CategoryFacet, CategoryGroup, PriceBounds, SortOrder,
};
pub use catalog::views::{project, ProductView};
pub use database_ops::products::{ProductData, ProductRecord, Store};
pub use database_ops::schema::ConvergenceReport;
pub use error::{StoreError, StoreResult};
