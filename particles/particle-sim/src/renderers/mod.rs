//! Built-in renderers
//!
//! Renderers only translate attributes into output primitives; shading and
//! mesh building belong to whatever consumes the [`RenderSink`](crate::operator::RenderSink).

mod sprite;

pub use sprite::{SpriteRenderer, SpriteRendererConfig};
