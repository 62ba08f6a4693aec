use chrono::{DateTime, FixedOffset, Offset, Utc};
use reqwest::Url;

pub const WELCOME_SUBJECT: &str = "Welcome to OpenBrief";
pub const OTP_SUBJECT: &str = "Password change request";
pub const PASSWORD_CHANGED_SUBJECT: &str = "Password changed successfully";

/// India Standard Time, UTC+05:30.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// `("March 5, 2025", "09:41 P.M. IST")`
pub fn ist_date_time(at: DateTime<Utc>) -> (String, String) {
    let offset = FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    let local = at.with_timezone(&offset);

    let date = local.format("%B %-d, %Y").to_string();
    let time = local
        .format("%I:%M %p")
        .to_string()
        .replace("AM", "A.M.")
        .replace("PM", "P.M.");

    (date, format!("{time} IST"))
}

/// Link the onboarding email points at; the client finishes the reset there.
pub fn reset_link(client_url: &str, otp: &str, email: &str) -> String {
    let base = format!("{}/auth/reset-password", client_url.trim_end_matches('/'));
    match Url::parse_with_params(&base, &[("otp", otp), ("email", email)]) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{base}?otp={otp}&email={email}"),
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn layout(heading: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>{heading}</h2>
{content}
</body>
</html>"#
    )
}

pub fn render_welcome(name: &str, link: &str, otp: &str, password: Option<&str>) -> String {
    let name = escape(name);
    let link = escape(link);
    let password = password
        .map(|p| format!("    <p>Your password is: <strong>{}</strong></p>\n", escape(p)))
        .unwrap_or_default();

    layout(
        &format!("Welcome {name}"),
        &format!(
            r#"    <p>Your OpenBrief account has been created.</p>
    <p><a href="{link}" style="display: inline-block; padding: 10px 20px; background: #0070f3; color: white; text-decoration: none; border-radius: 4px;">Set up your account</a></p>
    <p>Your OTP is: <strong>{otp}</strong></p>
{password}    <p style="color: #666; font-size: 14px;">If you didn't expect this email, you can ignore it.</p>"#
        ),
    )
}

pub fn render_otp(otp: &str, valid_minutes: i64) -> String {
    layout(
        "Password Reset",
        &format!(
            r#"    <p>Your OTP for password reset is <strong>{otp}</strong>. It is valid for {valid_minutes} minutes.</p>
    <p style="color: #666; font-size: 14px;">If you didn't request this, you can ignore it.</p>"#
        ),
    )
}

pub fn render_password_changed(at: DateTime<Utc>) -> String {
    let (date, time) = ist_date_time(at);
    layout(
        "Password Changed",
        &format!(
            r#"    <p>Your password was changed successfully on {date} at {time}.</p>
    <p style="color: #666; font-size: 14px;">If this wasn't you, reset your password immediately.</p>"#
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ist_formatting() {
        let at = Utc.with_ymd_and_hms(2025, 3, 5, 16, 11, 0).unwrap();
        let (date, time) = ist_date_time(at);
        assert_eq!(date, "March 5, 2025");
        assert_eq!(time, "09:41 P.M. IST");

        let morning = Utc.with_ymd_and_hms(2025, 12, 31, 20, 0, 0).unwrap();
        assert_eq!(ist_date_time(morning), ("January 1, 2026".into(), "01:30 A.M. IST".into()));
    }

    #[test]
    fn reset_link_encodes_email() {
        let link = reset_link("https://app.example.com/", "123456", "a+b@example.com");
        assert_eq!(
            link,
            "https://app.example.com/auth/reset-password?otp=123456&email=a%2Bb%40example.com"
        );
    }

    #[test]
    fn welcome_mentions_password_only_when_generated() {
        let with = render_welcome("Ann <admin>", "https://x.test", "000111", Some("Pa$$w0rd!x"));
        assert!(with.contains("Ann &lt;admin&gt;"));
        assert!(with.contains("Pa$$w0rd!x"));
        assert!(with.contains("000111"));

        let without = render_welcome("Ann", "https://x.test", "000111", None);
        assert!(!without.contains("Your password is"));
    }
}
