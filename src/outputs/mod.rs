//! Local artifacts and their uploads.
//!
//! # Submodules
//!
//! - [`raw`]: Stores the API response verbatim and uploads it under `datalake/raw/`
//! - [`views`]: Reshapes the response into JSON lines and uploads it under `datalake/views/`
//!
//! # Output Structure
//!
//! ```text
//! data_dir/
//! ├── raw-views/
//! │   └── raw-views-2024-11-18.txt
//! └── views/
//!     └── views-2024-11-18.json
//!
//! s3://bucket/
//! └── datalake/
//!     ├── raw/raw-views-2024-11-18.txt
//!     └── views/views-2024-11-18.json
//! ```

pub mod raw;
pub mod views;
