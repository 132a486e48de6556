//! # mess-printer
//!
//! ESC/POS thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building
//! - Network printing (TCP port 9100)
//!
//! Business logic (WHAT to print) stays in application code: receipt
//! rendering lives in mess-server.
//!
//! ## Example
//!
//! ```ignore
//! use mess_printer::{EscPosBuilder, NetworkPrinter, Printer};
//!
//! // Build ESC/POS content
//! let mut builder = EscPosBuilder::new(48);
//! builder.center();
//! builder.bold();
//! builder.line("*** Receipt ***");
//! builder.bold_off();
//! builder.sep_single();
//! builder.left();
//! builder.line_lr("Recharge Amount:", "Rs 200");
//! builder.cut_feed(4);
//!
//! // Send to network printer
//! let printer = NetworkPrinter::new("192.168.1.100", 9100)?;
//! printer.print(&builder.build()).await?;
//! ```

mod error;
mod escpos;
mod printer;

// Re-exports
pub use error::{PrintError, PrintResult};
pub use escpos::EscPosBuilder;
pub use printer::{NetworkPrinter, Printer};
