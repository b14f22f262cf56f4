//! Heuristic risk score.
//!
//! | Signal                    | Weight |
//! |---------------------------|--------|
//! | site unreachable          | +0.30  |
//! | no title                  | +0.10  |
//! | no description            | +0.10  |
//! | no contact email          | +0.10  |
//! | no phone                  | +0.10  |
//! | LinkedIn profile present  | −0.05  |
//! | Facebook page present     | −0.05  |
//!
//! The sum is clamped to [0, 1].

use crate::metadata::WebsiteMetadata;

const UNREACHABLE: f64 = 0.3;
const MISSING_SIGNAL: f64 = 0.1;
const SOCIAL_PRESENCE: f64 = 0.05;

/// Score a page. Higher is riskier.
pub fn risk_score(reachable: bool, metadata: &WebsiteMetadata) -> f64 {
    let mut score = 0.0;
    if !reachable {
        score += UNREACHABLE;
    }
    let missing = [
        metadata.title.is_none(),
        metadata.description.is_none(),
        metadata.emails.is_empty(),
        metadata.phones.is_empty(),
    ];
    score += MISSING_SIGNAL * missing.iter().filter(|m| **m).count() as f64;
    if metadata.social_links.linkedin.is_some() {
        score -= SOCIAL_PRESENCE;
    }
    if metadata.social_links.facebook.is_some() {
        score -= SOCIAL_PRESENCE;
    }
    // Rounded to hundredths so sums like 0.1 * 7 compare exactly.
    ((score * 100.0).round() / 100.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SocialLinks;
    use proptest::prelude::*;

    fn full() -> WebsiteMetadata {
        WebsiteMetadata {
            url: "https://acme.test".into(),
            reachable: true,
            status_code: Some(200),
            title: Some("Acme".into()),
            description: Some("We make things".into()),
            emails: vec!["hi@acme.test".into()],
            phones: vec!["+15550100".into()],
            social_links: SocialLinks::default(),
        }
    }

    #[test]
    fn complete_page_scores_zero() {
        assert_eq!(risk_score(true, &full()), 0.0);
    }

    #[test]
    fn unreachable_scores_at_least_point_three() {
        let m = WebsiteMetadata::unreachable("https://down.test", None);
        let s = risk_score(false, &m);
        assert!(s >= 0.3);
        assert_eq!(s, 0.7);
    }

    #[test]
    fn social_presence_lowers_score_but_not_below_zero() {
        let mut m = full();
        m.social_links.linkedin = Some("https://linkedin.com/company/acme".into());
        m.social_links.facebook = Some("https://facebook.com/acme".into());
        assert_eq!(risk_score(true, &m), 0.0);

        m.title = None;
        assert_eq!(risk_score(true, &m), 0.0);

        m.description = None;
        assert_eq!(risk_score(true, &m), 0.1);
    }

    proptest! {
        #[test]
        fn score_always_within_unit_interval(
            reachable in any::<bool>(),
            title in any::<bool>(),
            description in any::<bool>(),
            email in any::<bool>(),
            phone in any::<bool>(),
            linkedin in any::<bool>(),
            facebook in any::<bool>(),
        ) {
            let m = WebsiteMetadata {
                url: "https://p.test".into(),
                reachable,
                status_code: None,
                title: title.then(|| "t".to_string()),
                description: description.then(|| "d".to_string()),
                emails: if email { vec!["a@p.test".into()] } else { vec![] },
                phones: if phone { vec!["1".into()] } else { vec![] },
                social_links: SocialLinks {
                    linkedin: linkedin.then(|| "l".to_string()),
                    facebook: facebook.then(|| "f".to_string()),
                    ..SocialLinks::default()
                },
            };
            let s = risk_score(reachable, &m);
            prop_assert!((0.0..=1.0).contains(&s));
            if !reachable {
                prop_assert!(s >= 0.2);
            }
        }
    }
}
