// Context Loader: interview definition + best-matching résumé, loaded once per session.

pub mod loader;
pub mod source;
