//! Run report output.
//!
//! Every command ends by writing a JSON summary of what it did:
//!
//! ```text
//! <root>/output/reports/
//! ├── crawl_20261018_093000.json
//! ├── extract_articles_20261018_094500.json
//! └── translate_articles_20261018_100000.json
//! ```

pub mod json;
