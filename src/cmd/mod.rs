//! CLI command implementations.
//!
//! | Module     | Commands handled               |
//! |------------|--------------------------------|
//! | `project`  | `Init`                         |
//! | `generate` | `Generate`                     |
//! | `content`  | `Status`, `List`, `Delete`     |
//! | `config`   | `Config`                       |

pub mod config;
pub mod content;
pub mod generate;
pub mod project;

pub use config::cmd_config;
pub use content::{cmd_delete, cmd_list, cmd_status};
pub use generate::cmd_generate;
pub use project::cmd_init;
