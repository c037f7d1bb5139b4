pub mod coupon;
pub mod fields;
pub mod product;
