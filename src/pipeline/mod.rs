//! Pipeline stages between a file on disk and a [`crate::document::Document`].
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested without the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ (transport) ──▶ postprocess ──▶ blocks ──▶ describe
//! (path)    (data URL)   (OCR pages)     (cleanup)      (split)    (captions)
//! ```
//!
//! 1. [`input`] reads the file and checks it is a PDF or a supported image.
//! 2. [`encode`] builds and decodes base64 `data:` URLs and measures images.
//! 3. [`postprocess`] cleans up each page's markdown deterministically.
//! 4. [`blocks`] splits a page into headings, lists, tables, paragraphs
//!    and image references, in reading order.
//! 5. [`describe`] captions each image and fills its metadata. It is the
//!    only stage besides OCR itself that talks to the network.

pub mod blocks;
pub mod describe;
pub mod encode;
pub mod input;
pub mod postprocess;
