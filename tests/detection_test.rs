// Service-level flows over the in-memory store

mod helpers;

use chrono::{Duration, NaiveDate};
use helpers::*;
use reflect_backend::config::SchedulerConfig;
use reflect_backend::models::*;
use reflect_backend::services::deviation_engine::SOFT_NUDGE_TITLE;
use reflect_backend::services::digest::DIGEST_TITLE;
use reflect_backend::services::insight_service::NOT_ENOUGH_PATTERNS;
use reflect_backend::storage::InsightStorage;
use reflect_backend::AppError;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Three late-night weekday food purchases a week for five weeks, each at a
/// different merchant
fn late_night_food(user_id: Uuid) -> Vec<Transaction> {
    let tuesday = at(2024, 3, 5, 22);
    let mut txns = Vec::new();
    for week in 1..=5 {
        for day in 0..3 {
            let ts = tuesday - Duration::days(7 * week) + Duration::days(day);
            txns.push(txn(
                user_id,
                ts,
                300,
                &format!("Kitchen {}-{}", week, day),
                Category::Food,
            ));
        }
    }
    txns
}

// ============================================================================
// Deviation scan
// ============================================================================

#[tokio::test]
async fn test_weekly_jump_fires_deviation() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.seed(&this_week(user, Category::Food, 4, 1600)).await;

    let outcome = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();

    assert_eq!(outcome.count, 1);
    assert!(outcome.message.is_none());
    let event = &outcome.deviations[0];
    assert_eq!(event.category, Category::Food);
    assert_eq!(event.deviation_percentage, 60);
    assert_eq!(event.current_amount, Decimal::new(1600, 0));
    assert_eq!(event.baseline_amount, Decimal::new(1000, 0));
    assert_eq!(event.occurrence_count, 4);
    assert!(!event.acknowledged);
    assert_eq!(event.cooldown_until, wednesday() + Duration::days(21));
    assert!(event.narrative.contains("food"), "{}", event.narrative);
}

#[tokio::test]
async fn test_low_sensitivity_ignores_sixty_percent() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.set_preferences(
        user,
        NotificationPreferences {
            sensitivity: Sensitivity::Low,
            ..Default::default()
        },
    )
    .await;
    app.seed(&this_week(user, Category::Food, 4, 1600)).await;

    let outcome = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();

    assert_eq!(outcome.count, 0);
    assert!(app.storage.deviations_for_user(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_two_transactions_never_fire() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Shopping, 500).await;
    app.seed(&this_week(user, Category::Shopping, 2, 1500)).await;

    let outcome = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();

    assert_eq!(outcome.count, 0);
}

#[tokio::test]
async fn test_category_without_baseline_is_skipped() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.seed(&this_week(user, Category::Entertainment, 4, 5000)).await;

    let outcome = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();

    assert_eq!(outcome.count, 0);
}

#[tokio::test]
async fn test_cooldown_suppresses_second_scan() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.seed(&this_week(user, Category::Food, 4, 1600)).await;

    let first = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();
    assert_eq!(first.count, 1);

    let second = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday() + Duration::hours(6))
        .await
        .unwrap();
    assert_eq!(second.count, 0);

    assert_eq!(app.storage.deviations_for_user(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_muted_category_is_skipped() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.set_baseline(user, Category::Transport, 200).await;

    let mut preferences = NotificationPreferences::default();
    preferences.muted_categories.insert(Category::Food);
    app.set_preferences(user, preferences).await;

    app.seed(&this_week(user, Category::Food, 4, 1600)).await;
    app.seed(&this_week(user, Category::Transport, 3, 600)).await;

    let outcome = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();

    assert_eq!(outcome.count, 1);
    assert_eq!(outcome.deviations[0].category, Category::Transport);
    assert_eq!(outcome.deviations[0].deviation_percentage, 200);
}

#[tokio::test]
async fn test_cold_start_calculates_baselines() {
    let app = TestApp::new();
    let user = Uuid::new_v4();

    let baselines = app
        .state
        .baselines
        .calculate_baselines_at(user, wednesday())
        .await
        .unwrap();
    assert!(!baselines.calculated);

    let outcome = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();
    assert_eq!(outcome.count, 0);
    assert_eq!(outcome.message.as_deref(), Some("Baselines calculated"));
}

#[tokio::test]
async fn test_soft_nudge_references_deviation() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.set_preferences(
        user,
        NotificationPreferences {
            soft_nudges: true,
            weekly_digest: false,
            ..Default::default()
        },
    )
    .await;
    app.seed(&this_week(user, Category::Food, 4, 1600)).await;

    let outcome = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();
    let event = &outcome.deviations[0];

    let notifications = app.storage.notifications_for_user(user).await.unwrap();
    assert_eq!(notifications.len(), 1);
    let nudge = &notifications[0];
    assert_eq!(nudge.notification_type, NotificationType::SoftNudge);
    assert_eq!(nudge.title, SOFT_NUDGE_TITLE);
    assert_eq!(nudge.body, event.narrative);
    assert_eq!(nudge.data["deviation_id"], event.id.to_string());
}

#[tokio::test]
async fn test_no_nudge_by_default() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.seed(&this_week(user, Category::Food, 4, 1600)).await;

    app.state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();

    // Wednesday, so no digest either
    assert!(app.storage.notifications_for_user(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_acknowledge_deviation() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.seed(&this_week(user, Category::Food, 4, 1600)).await;

    let outcome = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();
    let id = outcome.deviations[0].id;

    let acked = app
        .state
        .deviations
        .acknowledge_deviation(user, id, Some("guests over"))
        .await
        .unwrap();
    assert!(acked.acknowledged);
    assert_eq!(acked.acknowledged_response.as_deref(), Some("guests over"));

    let other = app
        .state
        .deviations
        .acknowledge_deviation(Uuid::new_v4(), id, None)
        .await
        .unwrap_err();
    assert!(other.is_not_found());
}

// ============================================================================
// Weekly digest
// ============================================================================

#[tokio::test]
async fn test_monday_scan_writes_digest_once() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.seed(&[
        txn(user, at(2024, 3, 3, 10), 800, "Market", Category::Food),
        txn(user, at(2024, 3, 3, 13), 500, "Bakery", Category::Food),
        txn(user, at(2024, 3, 4, 8), 400, "Cafe", Category::Food),
    ])
    .await;

    let first = app
        .state
        .deviations
        .run_deviation_scan_at(user, monday())
        .await
        .unwrap();
    assert_eq!(first.count, 1);

    let checkins = app.storage.checkins_for_user(user).await.unwrap();
    assert_eq!(checkins.len(), 1);
    assert_eq!(
        checkins[0].week_start,
        NaiveDate::from_ymd_opt(2024, 2, 26).unwrap()
    );
    assert_eq!(checkins[0].category_changes[&Category::Food].change, 70);

    let digests: Vec<Notification> = app
        .storage
        .notifications_for_user(user)
        .await
        .unwrap()
        .into_iter()
        .filter(|n| n.notification_type == NotificationType::WeeklyDigest)
        .collect();
    assert_eq!(digests.len(), 1);
    assert_eq!(digests[0].title, DIGEST_TITLE);
    assert!(digests[0].body.contains("food"), "{}", digests[0].body);

    app.state
        .deviations
        .run_deviation_scan_at(user, monday() + Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(app.storage.checkins_for_user(user).await.unwrap().len(), 1);
    assert_eq!(digest_count(&app, user).await, 1);
}

async fn digest_count(app: &TestApp, user: Uuid) -> usize {
    app.storage
        .notifications_for_user(user)
        .await
        .unwrap()
        .iter()
        .filter(|n| n.notification_type == NotificationType::WeeklyDigest)
        .count()
}

#[tokio::test]
async fn test_concurrent_monday_scans_write_one_digest() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.seed(&[
        txn(user, at(2024, 3, 3, 10), 800, "Market", Category::Food),
        txn(user, at(2024, 3, 3, 13), 500, "Bakery", Category::Food),
        txn(user, at(2024, 3, 4, 8), 400, "Cafe", Category::Food),
    ])
    .await;

    let (first, second) = tokio::join!(
        app.state.deviations.run_deviation_scan_at(user, monday()),
        app.state.deviations.run_deviation_scan_at(user, monday()),
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(app.storage.checkins_for_user(user).await.unwrap().len(), 1);
    assert_eq!(digest_count(&app, user).await, 1);
}

#[tokio::test]
async fn test_checkin_is_unique_per_week() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let checkin = WeeklyCheckin {
        id: Uuid::new_v4(),
        user_id: user,
        week_start: NaiveDate::from_ymd_opt(2024, 2, 26).unwrap(),
        summary: "steady week".to_string(),
        category_changes: Default::default(),
        user_response: None,
        user_note: None,
        created_at: monday(),
    };
    assert!(app.storage.insert_weekly_checkin(&checkin).await.unwrap());

    let again = WeeklyCheckin {
        id: Uuid::new_v4(),
        ..checkin.clone()
    };
    assert!(!app.storage.insert_weekly_checkin(&again).await.unwrap());

    let next_week = WeeklyCheckin {
        id: Uuid::new_v4(),
        week_start: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        ..checkin.clone()
    };
    assert!(app.storage.insert_weekly_checkin(&next_week).await.unwrap());
    assert_eq!(app.storage.checkins_for_user(user).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_no_digest_midweek_or_when_disabled() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;

    app.state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();
    assert!(app.storage.checkins_for_user(user).await.unwrap().is_empty());

    app.set_preferences(
        user,
        NotificationPreferences {
            weekly_digest: false,
            ..Default::default()
        },
    )
    .await;
    app.state
        .deviations
        .run_deviation_scan_at(user, monday())
        .await
        .unwrap();
    assert!(app.storage.checkins_for_user(user).await.unwrap().is_empty());
}

// ============================================================================
// Baselines and patterns
// ============================================================================

#[tokio::test]
async fn test_baselines_average_over_twelve_weeks() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let txns: Vec<Transaction> = (1..=12)
        .map(|w| {
            txn(
                user,
                wednesday() - Duration::weeks(w),
                1000,
                "Grocer",
                Category::Food,
            )
        })
        .collect();
    app.seed(&txns).await;

    let outcome = app
        .state
        .baselines
        .calculate_baselines_at(user, wednesday())
        .await
        .unwrap();
    assert!(outcome.calculated);
    assert_eq!(outcome.categories, 1);

    let baselines = app.storage.baselines_for_user(user).await.unwrap();
    assert_eq!(baselines.len(), 1);
    assert_eq!(baselines[0].baseline_amount, Decimal::new(1000, 0));
    assert_eq!(baselines[0].baseline_count, 1);
    assert_eq!(baselines[0].time_period, TimePeriod::Weekly);
}

#[tokio::test]
async fn test_transactions_after_now_are_ignored() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let mut txns: Vec<Transaction> = (1..=12)
        .map(|w| {
            txn(
                user,
                wednesday() - Duration::weeks(w),
                1000,
                "Grocer",
                Category::Food,
            )
        })
        .collect();
    txns.push(txn(user, wednesday() + Duration::days(2), 6000, "Grocer", Category::Food));
    app.seed(&txns).await;

    app.state
        .baselines
        .calculate_baselines_at(user, wednesday())
        .await
        .unwrap();
    let baselines = app.storage.baselines_for_user(user).await.unwrap();
    assert_eq!(baselines[0].baseline_amount, Decimal::new(1000, 0));

    app.seed(&this_week(user, Category::Food, 4, 1600)).await;
    let outcome = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();
    assert_eq!(outcome.count, 1);
    assert_eq!(outcome.deviations[0].current_amount, Decimal::new(1600, 0));
    assert_eq!(outcome.deviations[0].occurrence_count, 4);
}

#[tokio::test]
async fn test_late_night_weekday_food_is_one_strong_pattern() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.seed(&late_night_food(user)).await;

    let outcome = app
        .state
        .patterns
        .detect_patterns_at(user, wednesday())
        .await
        .unwrap();

    assert_eq!(outcome.count, 1);
    let pattern = &outcome.patterns[0];
    assert_eq!(pattern.key.to_string(), "late_night:food");
    assert_eq!(pattern.title, "Late-night food");
    assert_eq!(pattern.confidence, Confidence::Strong);
    assert_eq!(pattern.occurrences, 15);
    assert_eq!(pattern.time_range, "9 PM – 12 AM");
    assert_eq!(pattern.average_amount, Decimal::new(300, 0));
    assert_eq!(pattern.trend, Trend::Stable);
}

#[tokio::test]
async fn test_regular_merchant_pattern() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let txns: Vec<Transaction> = (0..5)
        .map(|i| {
            txn(
                user,
                at(2024, 2, 12, 13) + Duration::days(i * 3),
                250,
                "Swiggy",
                Category::Food,
            )
        })
        .collect();
    app.seed(&txns).await;

    let outcome = app
        .state
        .patterns
        .detect_patterns_at(user, wednesday())
        .await
        .unwrap();

    let merchant = outcome
        .patterns
        .iter()
        .find(|p| p.key.kind == PatternKind::RegularMerchant)
        .expect("merchant pattern");
    assert_eq!(merchant.title, "Regular at Swiggy");
    assert_eq!(merchant.category, Category::Food);
    assert_eq!(merchant.occurrences, 5);
    assert_eq!(merchant.confidence, Confidence::Emerging);
}

#[tokio::test]
async fn test_merchant_pattern_takes_latest_category() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let txns: Vec<Transaction> = (0..5)
        .map(|i| {
            let category = if i < 3 { Category::Shopping } else { Category::Food };
            txn(
                user,
                at(2024, 2, 12, 13) + Duration::days(i * 3),
                250,
                "Swiggy",
                category,
            )
        })
        .collect();
    app.seed(&txns).await;

    let outcome = app
        .state
        .patterns
        .detect_patterns_at(user, wednesday())
        .await
        .unwrap();

    let merchant = outcome
        .patterns
        .iter()
        .find(|p| p.key.kind == PatternKind::RegularMerchant)
        .expect("merchant pattern");
    assert_eq!(merchant.category, Category::Food);
    assert_eq!(merchant.occurrences, 5);
}

#[tokio::test]
async fn test_redetection_keeps_first_detected() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.seed(&late_night_food(user)).await;

    let first = app
        .state
        .patterns
        .detect_patterns_at(user, wednesday())
        .await
        .unwrap();
    let later = wednesday() + Duration::days(1);
    let second = app
        .state
        .patterns
        .detect_patterns_at(user, later)
        .await
        .unwrap();

    assert_eq!(first.count, second.count);
    let stored = app.storage.patterns_for_user(user).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].first_detected, wednesday());
    assert_eq!(stored[0].last_updated, later);
}

// ============================================================================
// Insights and stories
// ============================================================================

#[tokio::test]
async fn test_stories_from_patterns() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let mut txns = late_night_food(user);
    txns[0].context_tags = vec![ContextTag::WorkStress];
    app.seed(&txns).await;

    app.state
        .patterns
        .detect_patterns_at(user, wednesday())
        .await
        .unwrap();
    let outcome = app
        .state
        .insights
        .generate_stories_at(user, wednesday())
        .await
        .unwrap();

    assert!(outcome.message.is_none());
    assert_eq!(outcome.stories.len(), 1);
    let story = &outcome.stories[0];
    assert_eq!(story.title, "Late-night food");
    assert_eq!(story.context_tags, vec![ContextTag::WorkStress]);
    assert_eq!(story.heatmap.tue, 5);
    assert_eq!(story.heatmap.wed, 5);
    assert_eq!(story.heatmap.thu, 5);
    assert_eq!(story.heatmap.total(), 15);
    assert!(!story.narrative.is_empty());
}

#[tokio::test]
async fn test_stories_need_patterns() {
    let app = TestApp::new();
    let outcome = app
        .state
        .insights
        .generate_stories_at(Uuid::new_v4(), wednesday())
        .await
        .unwrap();
    assert!(outcome.stories.is_empty());
    assert_eq!(outcome.message.as_deref(), Some(NOT_ENOUGH_PATTERNS));
}

#[tokio::test]
async fn test_insight_feedback_and_dismissal() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    app.seed(&late_night_food(user)).await;
    app.state
        .patterns
        .detect_patterns_at(user, wednesday())
        .await
        .unwrap();

    let key = PatternKey::parse("late_night:food").unwrap();
    let insight = app
        .state
        .insights
        .record_feedback(user, &key, Feedback::Accurate)
        .await
        .unwrap();
    assert_eq!(insight.feedback, Some(Feedback::Accurate));
    assert!(!insight.dismissed);

    app.state.insights.dismiss_insight(user, &key).await.unwrap();

    let visible = app.state.insights.list_insights(user, false).await.unwrap();
    assert!(visible.is_empty());

    let all = app.state.insights.list_insights(user, true).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].dismissed);
    assert_eq!(all[0].feedback, Some(Feedback::Accurate));
}

#[tokio::test]
async fn test_feedback_for_unknown_pattern_is_not_found() {
    let app = TestApp::new();
    let key = PatternKey::parse("weekend:shopping").unwrap();
    let err = app
        .state
        .insights
        .record_feedback(Uuid::new_v4(), &key, Feedback::NotQuite)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============================================================================
// Text generation
// ============================================================================

#[tokio::test]
async fn test_ai_narrative_accepted_when_tentative() {
    let reply = "It looks like food took up more of your week than usual.";
    let app = TestApp::with_generator(Arc::new(CannedGenerator(reply.to_string())));
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.seed(&this_week(user, Category::Food, 4, 1600)).await;

    let outcome = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();
    assert_eq!(outcome.deviations[0].narrative, reply);
}

#[tokio::test]
async fn test_prescriptive_ai_narrative_falls_back_to_template() {
    let app = TestApp::with_generator(Arc::new(CannedGenerator(
        "You should stop overspending on food.".to_string(),
    )));
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.seed(&this_week(user, Category::Food, 4, 1600)).await;

    let outcome = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();
    let narrative = &outcome.deviations[0].narrative;
    assert!(!narrative.contains("You should"), "{}", narrative);
    assert!(narrative.contains("food"), "{}", narrative);
}

#[tokio::test]
async fn test_rate_limited_narrative_still_records_deviation() {
    let app = TestApp::with_generator(Arc::new(RateLimitedGenerator));
    let user = Uuid::new_v4();
    app.set_baseline(user, Category::Food, 1000).await;
    app.seed(&this_week(user, Category::Food, 4, 1600)).await;

    let outcome = app
        .state
        .deviations
        .run_deviation_scan_at(user, wednesday())
        .await
        .unwrap();
    assert_eq!(outcome.count, 1);
    assert!(outcome.deviations[0].narrative.contains("food"));
}

#[tokio::test]
async fn test_statement_analysis_from_fenced_reply() {
    let reply = r#"Here is the analysis:
```json
{
  "summary": {
    "totalTransactions": 2,
    "totalSpent": 1250.5,
    "dateRange": {"start": "2024-03-01", "end": "2024-03-31"},
    "topCategories": [{"name": "food", "amount": 1000.0, "percentage": 80.0}]
  },
  "patterns": [{
    "id": "p1",
    "title": "Late dinners",
    "description": "Food orders after 10 PM",
    "confidence": "strong",
    "category": "food",
    "occurrences": 2,
    "averageAmount": 500.0,
    "timeRange": "10 PM – 12 AM",
    "trend": "stable"
  }],
  "insights": [],
  "transactions": [
    {"date": "2024-03-02", "description": "Swiggy", "amount": 1000.0, "category": "food"},
    {"date": "2024-03-09", "description": "Metro", "amount": 250.5, "category": "transport"}
  ]
}
```"#;
    let app = TestApp::with_generator(Arc::new(CannedGenerator(reply.to_string())));

    let analysis = app
        .state
        .statements
        .analyze_statement("02/03 SWIGGY 1000.00\n09/03 METRO 250.50")
        .await
        .unwrap();

    assert!(!analysis.is_degraded());
    assert_eq!(analysis.summary.total_transactions, 2);
    assert_eq!(analysis.transactions.len(), 2);
    // Two occurrences is weak regardless of what the generator claimed
    assert_eq!(analysis.patterns[0].confidence, Confidence::Weak);
}

#[tokio::test]
async fn test_statement_generator_errors_keep_status() {
    let app = TestApp::with_generator(Arc::new(RateLimitedGenerator));
    let err = app
        .state
        .statements
        .analyze_statement("some statement")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 429);

    let app = TestApp::with_generator(Arc::new(QuotaExhaustedGenerator));
    let err = app
        .state
        .statements
        .analyze_statement("some statement")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 402);
}

#[tokio::test]
async fn test_statement_without_generator_is_unavailable() {
    let app = TestApp::new();
    let err = app
        .state
        .statements
        .analyze_statement("some statement")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 502);
}

// ============================================================================
// Scheduler
// ============================================================================

#[tokio::test]
async fn test_scheduler_pass_covers_active_users() {
    let app = TestApp::new();
    let quiet = Uuid::new_v4();
    let busy = Uuid::new_v4();

    app.seed(&late_night_food(quiet)).await;
    app.seed(&late_night_food(busy)).await;
    app.seed(&this_week(busy, Category::Shopping, 4, 8000)).await;
    app.set_baseline(busy, Category::Shopping, 500).await;

    let scheduler = app.state.scheduler(SchedulerConfig {
        interval_secs: 0,
        concurrency: 1,
    });
    let summary = scheduler.run_pass(wednesday()).await.unwrap();

    assert_eq!(summary.users, 2);
    assert_eq!(summary.failed, 0);
    // Shopping has no spend before this week, so its baseline stays at 500
    assert_eq!(summary.deviations, 1);
    let shopping = app.storage.baselines_for_user(busy).await.unwrap();
    let shopping = shopping
        .iter()
        .find(|b| b.category == Category::Shopping)
        .unwrap();
    assert_eq!(shopping.baseline_amount, Decimal::new(500, 0));

    for user in [quiet, busy] {
        assert_eq!(app.storage.patterns_for_user(user).await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_scheduler_refresh_excludes_current_week() {
    let app = TestApp::new();
    let user = Uuid::new_v4();
    let history: Vec<Transaction> = (1..=12)
        .map(|w| {
            txn(
                user,
                wednesday() - Duration::weeks(w),
                1000,
                "Grocer",
                Category::Food,
            )
        })
        .collect();
    app.seed(&history).await;
    app.set_baseline(user, Category::Food, 1000).await;
    app.seed(&this_week(user, Category::Food, 4, 1600)).await;

    let scheduler = app.state.scheduler(SchedulerConfig {
        interval_secs: 0,
        concurrency: 1,
    });
    let summary = scheduler.run_pass(wednesday()).await.unwrap();

    assert_eq!(summary.deviations, 1);
    let baselines = app.storage.baselines_for_user(user).await.unwrap();
    assert_eq!(baselines[0].baseline_amount, Decimal::new(1000, 0));

    let events = app.storage.deviations_for_user(user).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].deviation_percentage, 60);
}

#[test]
fn test_scheduler_pass_blocking() {
    let app = TestApp::new();
    let scheduler = app.state.scheduler(SchedulerConfig {
        interval_secs: 0,
        concurrency: 4,
    });

    let summary = tokio_test::block_on(scheduler.run_pass(wednesday())).unwrap();
    assert_eq!(summary.users, 0);
    assert_eq!(summary.deviations, 0);
}
