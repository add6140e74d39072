//! Output side of a render pass.
//!
//! Painting is the rendering collaborator's job. This layer only computes
//! what it needs: resolved props and visibility per node.
//!
//! ```text
//! NodeRegistry + StateStore → render_tree → Vec<RenderNode> → collaborator
//! ```

pub mod viewmodel;

pub use viewmodel::RenderNode;
