use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, QueryBuilder, Sqlite};

use crate::util::deserialize_lenient_count;

/// Optional filters for the scan frequency report.
///
/// `activity_category` narrows the scans before they are grouped. The
/// frequency bounds are inclusive and apply to the per-activity count; an
/// inverted range is allowed and matches nothing. Blank filters are ignored.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyQuery {
    #[serde(default, deserialize_with = "deserialize_lenient_count")]
    pub min_frequency: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_lenient_count")]
    pub max_frequency: Option<i64>,
    #[serde(default)]
    pub activity_category: Option<String>,
}

/// Number of scans for one (activity name, category) pair
#[derive(Deserialize, Serialize, Debug, Clone, FromRow, PartialEq, Eq)]
pub struct ActivityFrequency {
    pub activity_name: String,
    pub activity_category: String,
    pub frequency: i64,
}

/// Where a predicate is applied relative to grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    Where,
    Having,
}

impl Clause {
    fn keyword(self) -> &'static str {
        match self {
            Clause::Where => " where ",
            Clause::Having => " having ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    Text(String),
    Integer(i64),
}

/// A single filter fragment: `<sql> ?` with one bound value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub clause: Clause,
    pub sql: &'static str,
    pub value: Bound,
}

impl FrequencyQuery {
    pub fn predicates(&self) -> Vec<Predicate> {
        [
            self.activity_category
                .clone()
                .filter(|category| !category.is_empty())
                .map(|category| Predicate {
                    clause: Clause::Where,
                    sql: "activity_category = ",
                    value: Bound::Text(category),
                }),
            self.min_frequency.map(|min| Predicate {
                clause: Clause::Having,
                sql: "count(*) >= ",
                value: Bound::Integer(min),
            }),
            self.max_frequency.map(|max| Predicate {
                clause: Clause::Having,
                sql: "count(*) <= ",
                value: Bound::Integer(max),
            }),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Builds the grouped count query, ordered by activity name then category.
    pub fn build(&self) -> QueryBuilder<'static, Sqlite> {
        let predicates = self.predicates();

        let mut builder = QueryBuilder::new(
            "select activity_name, activity_category, count(*) as frequency from scans",
        );
        push_predicates(&mut builder, Clause::Where, &predicates);
        builder.push(" group by activity_name, activity_category");
        push_predicates(&mut builder, Clause::Having, &predicates);
        builder.push(" order by activity_name, activity_category");

        builder
    }
}

fn push_predicates(builder: &mut QueryBuilder<'static, Sqlite>, clause: Clause, predicates: &[Predicate]) {
    let matching = predicates.iter().filter(|p| p.clause == clause);

    for (i, predicate) in matching.enumerate() {
        builder.push(if i == 0 { clause.keyword() } else { " and " });
        builder.push(predicate.sql);
        match &predicate.value {
            Bound::Text(text) => builder.push_bind(text.clone()),
            Bound::Integer(n) => builder.push_bind(*n),
        };
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{
        db::ParticipantDb,
        participant::{create_participant, delete_participant, NewParticipant},
        scan::record_scan,
    };

    use super::{ActivityFrequency, FrequencyQuery};

    fn freq(name: &str, category: &str, frequency: i64) -> ActivityFrequency {
        ActivityFrequency {
            activity_name: name.to_owned(),
            activity_category: category.to_owned(),
            frequency,
        }
    }

    /// Scans: A/cat1 x3, B/cat1 x1, C/cat2 x5, spread over five hackers.
    async fn seeded() -> ParticipantDb {
        let db = ParticipantDb::memory().await.unwrap();
        for i in 0..5 {
            create_participant(
                &db,
                &NewParticipant {
                    name: format!("Hacker {}", i),
                    email: format!("h{}@example.com", i),
                    phone: None,
                    badge_code: format!("H{}", i),
                },
            )
            .await
            .unwrap();
        }

        for i in 0..3 {
            record_scan(&db, &format!("H{}", i), "A", "cat1").await.unwrap();
        }
        record_scan(&db, "H0", "B", "cat1").await.unwrap();
        for i in 0..5 {
            record_scan(&db, &format!("H{}", i), "C", "cat2").await.unwrap();
        }

        db
    }

    #[test]
    fn test_sql_without_filters() {
        let query = FrequencyQuery::default();
        assert!(query.predicates().is_empty());
        assert_eq!(
            query.build().sql(),
            "select activity_name, activity_category, count(*) as frequency from scans \
             group by activity_name, activity_category \
             order by activity_name, activity_category"
        );
    }

    #[test]
    fn test_sql_with_all_filters() {
        let query = FrequencyQuery {
            min_frequency: Some(2),
            max_frequency: Some(4),
            activity_category: Some("cat1".to_owned()),
        };

        assert_eq!(query.predicates().len(), 3);
        assert_eq!(
            query.build().sql(),
            "select activity_name, activity_category, count(*) as frequency from scans \
             where activity_category = ? \
             group by activity_name, activity_category \
             having count(*) >= ? and count(*) <= ? \
             order by activity_name, activity_category"
        );
    }

    #[test]
    fn test_sql_with_max_only() {
        let query = FrequencyQuery {
            max_frequency: Some(1),
            ..Default::default()
        };

        let builder = query.build();
        assert!(builder.sql().contains(" having count(*) <= ? "));
        assert!(!builder.sql().contains(" where "));
    }

    #[tokio::test]
    async fn test_unfiltered() {
        let db = seeded().await;
        assert_eq!(
            db.scan_frequencies(&FrequencyQuery::default()).await.unwrap(),
            vec![freq("A", "cat1", 3), freq("B", "cat1", 1), freq("C", "cat2", 5)]
        );
    }

    #[tokio::test]
    async fn test_category_and_min() {
        let db = seeded().await;
        let query = FrequencyQuery {
            min_frequency: Some(2),
            activity_category: Some("cat1".to_owned()),
            ..Default::default()
        };

        assert_eq!(
            db.scan_frequencies(&query).await.unwrap(),
            vec![freq("A", "cat1", 3)]
        );
    }

    #[tokio::test]
    async fn test_bounds_are_inclusive() {
        let db = seeded().await;
        let query = FrequencyQuery {
            min_frequency: Some(1),
            max_frequency: Some(3),
            ..Default::default()
        };

        assert_eq!(
            db.scan_frequencies(&query).await.unwrap(),
            vec![freq("A", "cat1", 3), freq("B", "cat1", 1)]
        );
    }

    #[tokio::test]
    async fn test_inverted_range_is_empty() {
        let db = seeded().await;
        let query = FrequencyQuery {
            min_frequency: Some(4),
            max_frequency: Some(2),
            ..Default::default()
        };

        assert!(db.scan_frequencies(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_category() {
        let db = seeded().await;
        let query = FrequencyQuery {
            activity_category: Some("CAT1".to_owned()),
            ..Default::default()
        };

        assert!(db.scan_frequencies(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_category_is_ignored() {
        let db = seeded().await;
        let query = FrequencyQuery {
            activity_category: Some(String::new()),
            ..Default::default()
        };

        assert!(query.predicates().is_empty());
        assert_eq!(
            db.scan_frequencies(&query).await.unwrap(),
            vec![freq("A", "cat1", 3), freq("B", "cat1", 1), freq("C", "cat2", 5)]
        );
    }

    #[test]
    fn test_blank_bounds_are_ignored() {
        let query: FrequencyQuery = serde_json::from_str(
            r#"{"min_frequency": "", "max_frequency": "lots", "activity_category": "cat1"}"#,
        )
        .unwrap();
        assert_eq!(query.min_frequency, None);
        assert_eq!(query.max_frequency, None);

        let query: FrequencyQuery =
            serde_json::from_str(r#"{"min_frequency": " 2 ", "max_frequency": 4}"#).unwrap();
        assert_eq!(query.min_frequency, Some(2));
        assert_eq!(query.max_frequency, Some(4));
        assert_eq!(query.activity_category, None);
    }

    #[tokio::test]
    async fn test_reflects_deleted_hackers() {
        let db = seeded().await;
        delete_participant(&db, "H0").await.unwrap();

        assert_eq!(
            db.scan_frequencies(&FrequencyQuery::default()).await.unwrap(),
            vec![freq("A", "cat1", 2), freq("C", "cat2", 4)]
        );
    }
}
