pub mod accessdate;
pub mod aliases;
pub mod config;
pub mod diff;
pub mod mediawiki;
pub mod rewrite;
pub mod wayback;
pub mod wikitext;
