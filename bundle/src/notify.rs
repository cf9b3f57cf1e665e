/// Joins the recipients into the comma-separated list handed to whoever sends the mail.
pub fn recipient_report(emails: &[String]) -> String {
    emails.join(",")
}
