//! Notification formatter: renders reminder bodies from templates.
//!
//! Pure functions only: no I/O, no clock. Templates come from
//! `[templates]` in the config and use `{name}` placeholders:
//!
//! | Placeholder | Value |
//! |---|---|
//! | `{name}` | recipient display name |
//! | `{checkpoint}` / `{CHECKPOINT}` | `morning` / `MORNING` |
//! | `{count}` | 1-based follow-up number |
//! | `{total}` | follow-ups in this chain, `min(cap, backoff length)` |
//! | `{next_minutes}` | minutes until the next follow-up |
//! | `{max_followups}` | same as `{total}`, for the initial reminder |
//! | `{footer}` | rendered progress or final-reminder footer |
//!
//! A placeholder with no value renders as empty text and logs a warning, so
//! a customised template can never leak a literal `{token}` to a recipient.

use rollcall_core::config::MessageTemplates;
use rollcall_core::types::Checkpoint;

use crate::recap::RecapSummary;

/// Message urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// The first reminder at the checkpoint time.
    Initial,
    Polite,
    Direct,
    Urgent,
}

impl Tier {
    /// Tier for a 1-based follow-up count: 1–2 polite, 3–5 direct, 6+ urgent.
    pub fn for_followup(count: u32) -> Tier {
        match count {
            0 => Tier::Initial,
            1..=2 => Tier::Polite,
            3..=5 => Tier::Direct,
            _ => Tier::Urgent,
        }
    }
}

/// Where a message sits in its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// 1-based follow-up number; 0 for the initial reminder.
    pub count: u32,
    /// Follow-ups this chain will send at most.
    pub total: u32,
    /// Minutes until the next follow-up, `None` when this is the last one.
    pub next_minutes: Option<u32>,
}

impl Progress {
    pub fn is_last(&self) -> bool {
        self.next_minutes.is_none()
    }
}

/// Renders reminder and recap bodies.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    templates: MessageTemplates,
}

impl Formatter {
    pub fn new(templates: MessageTemplates) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &MessageTemplates {
        &self.templates
    }

    /// Render a reminder for `tier`. `progress.count` is ignored for the
    /// initial tier.
    pub fn render(&self, tier: Tier, checkpoint: Checkpoint, name: &str, progress: &Progress) -> String {
        let t = &self.templates;
        let template = match (tier, checkpoint) {
            (Tier::Initial, Checkpoint::Morning) => &t.initial_morning,
            (Tier::Initial, Checkpoint::Evening) => &t.initial_evening,
            (Tier::Polite, _) => &t.followup_polite,
            (Tier::Direct, _) => &t.followup_direct,
            (Tier::Urgent, _) => &t.followup_urgent,
        };

        let count = progress.count.to_string();
        let total = progress.total.to_string();
        let next = progress
            .next_minutes
            .map(|m| m.to_string())
            .unwrap_or_default();
        let upper = checkpoint.as_str().to_uppercase();

        let footer_template = if progress.is_last() {
            &t.footer_final
        } else {
            &t.footer_progress
        };
        let footer = render_template(
            footer_template,
            &[("count", &count), ("total", &total), ("next_minutes", &next)],
        );

        render_template(
            template,
            &[
                ("name", name),
                ("checkpoint", checkpoint.as_str()),
                ("CHECKPOINT", &upper),
                ("count", &count),
                ("total", &total),
                ("next_minutes", &next),
                ("max_followups", &total),
                ("footer", &footer),
            ],
        )
    }

    /// The first reminder of a chain.
    pub fn initial(&self, checkpoint: Checkpoint, name: &str, total: u32, next_minutes: Option<u32>) -> String {
        self.render(
            Tier::Initial,
            checkpoint,
            name,
            &Progress { count: 0, total, next_minutes },
        )
    }

    pub fn weekly_recap(&self, summary: &RecapSummary) -> String {
        let start = summary.start.format("%d/%m").to_string();
        let end = summary.end.format("%d/%m").to_string();
        let morning = summary.morning.to_string();
        let evening = summary.evening.to_string();
        let expected = summary.expected_days.to_string();
        let pct = summary.percentage().to_string();
        render_template(
            &self.templates.weekly_recap,
            &[
                ("name", &summary.name),
                ("start", &start),
                ("end", &end),
                ("morning", &morning),
                ("evening", &evening),
                ("expected", &expected),
                ("percentage", &pct),
                ("status", summary.status_line()),
            ],
        )
    }
}

/// Single-pass `{ident}` substitution. Substituted values are not rescanned.
/// Braces that do not wrap an identifier are copied through.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let ident_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());

        if ident_len > 0 && after[ident_len..].starts_with('}') {
            let key = &after[..ident_len];
            match vars.iter().find(|(k, _)| *k == key) {
                Some((_, value)) => out.push_str(value),
                None => tracing::warn!("⚠️ Template placeholder {{{}}} has no value", key),
            }
            rest = &after[ident_len + 1..];
        } else {
            out.push('{');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn progress(count: u32, total: u32, next: Option<u32>) -> Progress {
        Progress { count, total, next_minutes: next }
    }

    fn has_placeholder(s: &str) -> bool {
        let mut rest = s;
        while let Some(i) = rest.find('{') {
            let after = &rest[i + 1..];
            let n = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if n > 0 && after[n..].starts_with('}') {
                return true;
            }
            rest = after;
        }
        false
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(Tier::for_followup(1), Tier::Polite);
        assert_eq!(Tier::for_followup(2), Tier::Polite);
        assert_eq!(Tier::for_followup(3), Tier::Direct);
        assert_eq!(Tier::for_followup(5), Tier::Direct);
        assert_eq!(Tier::for_followup(6), Tier::Urgent);
        assert_eq!(Tier::for_followup(10), Tier::Urgent);
    }

    #[test]
    fn test_followup_six_of_ten_is_urgent() {
        let f = Formatter::default();
        let body = f.render(
            Tier::for_followup(6),
            Checkpoint::Morning,
            "Rina",
            &progress(6, 10, Some(89)),
        );
        assert!(body.contains("URGENT"));
        assert!(body.contains("6/10"));
        assert!(body.contains("next in 89 min"));
        assert!(body.contains("MORNING"));
    }

    #[test]
    fn test_last_followup_footer() {
        let f = Formatter::default();
        let body = f.render(Tier::Polite, Checkpoint::Evening, "Rina", &progress(2, 2, None));
        assert!(body.contains("last reminder (2/2)"));
        assert!(!body.contains("next in"));
    }

    #[test]
    fn test_initial_mentions_followups() {
        let f = Formatter::default();
        let body = f.initial(Checkpoint::Morning, "Rina", 2, Some(5));
        assert!(body.contains("Good morning, *Rina*"));
        assert!(body.contains("Up to 2 follow-ups"));
        let evening = f.initial(Checkpoint::Evening, "Rina", 10, Some(5));
        assert!(evening.contains("check out"));
    }

    #[test]
    fn test_no_placeholders_left_in_any_tier() {
        let f = Formatter::default();
        for cp in Checkpoint::ALL {
            for tier in [Tier::Initial, Tier::Polite, Tier::Direct, Tier::Urgent] {
                for p in [progress(1, 3, Some(8)), progress(3, 3, None)] {
                    let body = f.render(tier, cp, "Budi", &p);
                    assert!(!has_placeholder(&body), "{tier:?}/{cp}: {body}");
                }
            }
        }
    }

    #[test]
    fn test_unknown_placeholder_renders_empty() {
        let out = render_template("Hi {name}, {mystery}done {not closed", &[("name", "A")]);
        assert_eq!(out, "Hi A, done {not closed");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let out = render_template("{name}!", &[("name", "{name}")]);
        assert_eq!(out, "{name}!");
    }

    #[test]
    fn test_weekly_recap_render() {
        let f = Formatter::default();
        let summary = RecapSummary {
            name: "Rina".into(),
            start: NaiveDate::from_ymd_opt(2026, 2, 16).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            morning: 5,
            evening: 4,
            expected_days: 5,
        };
        let body = f.weekly_recap(&summary);
        assert!(body.contains("16/02 — 20/02"));
        assert!(body.contains("*5/5* days"));
        assert!(body.contains("*90%*"));
        assert!(body.contains("Excellent"));
        assert!(!has_placeholder(&body));
    }
}
