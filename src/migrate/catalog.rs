//! Embedded migration scripts, one up/down pair per version, partitioned by
//! driver. Scripts are written against the canonical `cfmg_` table prefix;
//! `Migrator::new` substitutes the configured prefix once at construction.

use super::Migration;

pub(crate) fn postgres_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            semver: "0.1.0",
            up_sql: include_str!("sql/postgres/0001_init.up.sql").to_string(),
            down_sql: include_str!("sql/postgres/0001_init.down.sql").to_string(),
        },
        Migration {
            version: 2,
            semver: "0.2.0",
            up_sql: include_str!("sql/postgres/0002_display.up.sql").to_string(),
            down_sql: include_str!("sql/postgres/0002_display.down.sql").to_string(),
        },
        Migration {
            version: 3,
            semver: "0.3.0",
            up_sql: include_str!("sql/postgres/0003_events.up.sql").to_string(),
            down_sql: include_str!("sql/postgres/0003_events.down.sql").to_string(),
        },
    ]
}

pub(crate) fn mysql_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            semver: "0.1.0",
            up_sql: include_str!("sql/mysql/0001_init.up.sql").to_string(),
            down_sql: include_str!("sql/mysql/0001_init.down.sql").to_string(),
        },
        Migration {
            version: 2,
            semver: "0.2.0",
            up_sql: include_str!("sql/mysql/0002_display.up.sql").to_string(),
            down_sql: include_str!("sql/mysql/0002_display.down.sql").to_string(),
        },
        Migration {
            version: 3,
            semver: "0.3.0",
            up_sql: include_str!("sql/mysql/0003_events.up.sql").to_string(),
            down_sql: include_str!("sql/mysql/0003_events.down.sql").to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_contiguous_from_one() {
        for migrations in [postgres_migrations(), mysql_migrations()] {
            for (i, m) in migrations.iter().enumerate() {
                assert_eq!(m.version, i as i64 + 1);
            }
        }
    }

    #[test]
    fn test_every_up_script_advances_the_version_marker() {
        for migrations in [postgres_migrations(), mysql_migrations()] {
            for m in &migrations {
                let marker = format!(
                    "INSERT INTO cfmg_registry_schema_version (version, semver) VALUES ({}, '{}')",
                    m.version, m.semver
                );
                assert!(
                    m.up_sql.contains(&marker),
                    "up script {} is missing its version marker",
                    m.version
                );
            }
        }
    }

    #[test]
    fn test_every_down_script_retracts_the_version_marker() {
        for migrations in [postgres_migrations(), mysql_migrations()] {
            for m in &migrations {
                if m.version == 1 {
                    // bootstrap down drops the version table itself
                    assert!(m.down_sql.contains("DROP TABLE IF EXISTS cfmg_registry_schema_version"));
                } else {
                    let marker = format!(
                        "DELETE FROM cfmg_registry_schema_version WHERE version = {}",
                        m.version
                    );
                    assert!(m.down_sql.contains(&marker));
                }
            }
        }
    }
}
