//! Concrete analysis/optimization passes built on [`crate::pass::Pass`].

pub mod confirm;
