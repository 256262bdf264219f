//! Label artifacts: QR images, PDF documents and the HTML fallback.

pub mod html;
pub mod pdf;
pub mod qr;

pub use html::label_html;
pub use pdf::{label_pdf, sheet_pdf};
pub use qr::{etag, png, QrMatrix};
