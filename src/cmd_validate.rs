//! `validate` and `check` commands.

use std::path::Path;

use cadence_config::{ConfigLoader, ConfigValidator};
use cadence_scheduler::CronResolver;
use chrono::Utc;

/// Validate a trigger set and print its next fire times.
pub(crate) fn validate_expressions(
    expressions: &[String],
    count: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let now = Utc::now();
    CronResolver::validate(expressions, now)?;

    let fire = CronResolver::next(expressions, None, now)?;
    println!("Valid. Next fire {} (interval {}s)", fire.next, fire.interval.num_seconds());

    let mut upcoming = Vec::new();
    for expr in expressions {
        for at in CronResolver::upcoming(expr, now, count)? {
            upcoming.push((at, expr.as_str()));
        }
    }
    upcoming.sort();
    upcoming.truncate(count);

    for (at, expr) in upcoming {
        println!("  {}  {}", at.to_rfc3339(), expr);
    }
    Ok(())
}

/// Load and validate a configuration file, including its cron entries.
pub(crate) fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load(path)?;
    let mut result = ConfigValidator::validate(&config)?;

    let now = Utc::now();
    for (i, entry) in config.cron.iter().enumerate() {
        if let Err(e) = CronResolver::validate(&entry.expressions, now) {
            result.add_error(cadence_config::ValidationError::new(
                format!("cron[{}].expressions", i),
                e.to_string(),
            ));
        }
    }

    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for e in &result.errors {
        println!("error: {}: {}", e.path, e.message);
    }

    if !result.is_valid() {
        return Err(format!("{} has {} error(s)", path.display(), result.errors.len()).into());
    }
    println!(
        "{} is valid ({} cron definition(s), namespace {})",
        path.display(),
        config.cron.len(),
        config.scheduler.period_namespace()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_rejects_colliding_set() {
        let exprs = vec!["*/2 * * * *".to_string(), "*/3 * * * *".to_string()];
        assert!(validate_expressions(&exprs, 5).is_err());
    }

    #[test]
    fn test_check_reports_bad_cron_entry() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[cron]]
identity = "broken"
expressions = ["not a cron"]
"#
        )
        .unwrap();

        assert!(check_config(file.path()).is_err());
    }

    #[test]
    fn test_check_accepts_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        check_config(file.path()).unwrap();
    }
}
