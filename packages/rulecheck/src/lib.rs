//! Main library for rulecheck, used by its CLI.
//!
//! Rules are loaded from YAML or JSON with [`rules::Loader`], then evaluated
//! against files with [`engine::Engine`]:
//!
//! ```
//! use rulecheck::engine::{Engine, MatchContext};
//! use rulecheck::rules::{Format, Loader};
//!
//! let mut loader = Loader::default();
//! loader.load_str(
//!     "inline",
//!     r#"
//! name: no-console-log
//! filters:
//!   - kind: content
//!     pattern: "console\\.log"
//! actions:
//!   - kind: enforce
//!     message: remove console.log
//! "#,
//!     Format::Yaml,
//! );
//! let report = loader.finish();
//! assert!(report.errors.is_empty());
//!
//! let engine = Engine::new(report.rules);
//! let results = engine.evaluate(&MatchContext::new("a.js", "console.log('x')"));
//! assert!(results[0].matched);
//! assert!(rulecheck::engine::any_enforced(&results));
//! ```

pub mod engine;
pub mod rules;
pub mod snippet;
pub mod template;
