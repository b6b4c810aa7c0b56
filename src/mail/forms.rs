//! Builders turning website form submissions into [`EmailRequest`]s.
//!
//! Every submitter-supplied value is HTML-escaped before it reaches the message body. Recipients
//! always come from [`FormRecipients`], never from the submission itself.

// std
use std::fmt::Write;
// self
use crate::{
	_prelude::*,
	mail::{EmailRequest, FormRecipients, ReplyTo},
};

/// General inquiry submitted through the contact form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
	/// Submitter's name.
	pub name: String,
	/// Submitter's email address; becomes the reply-to address.
	pub email: String,
	/// Optional phone number.
	#[serde(default)]
	pub phone: Option<String>,
	/// Optional company name.
	#[serde(default)]
	pub company: Option<String>,
	/// Free-form message.
	pub message: String,
}
impl ContactForm {
	/// Renders the submission for the contact recipients.
	pub fn to_email_request(&self, recipients: &FormRecipients) -> EmailRequest {
		let mut body = String::from("<h2>New contact form submission</h2>\n<ul>\n");

		push_field(&mut body, "Name", &self.name);
		push_field(&mut body, "Email", &self.email);
		push_optional_field(&mut body, "Phone", self.phone.as_deref());
		push_optional_field(&mut body, "Company", self.company.as_deref());
		body.push_str("</ul>\n");
		push_paragraph(&mut body, &self.message);

		EmailRequest::new(
			format!("Contact request from {}", self.name.trim()),
			body,
			recipients.contact.iter().cloned(),
		)
		.with_reply_to(ReplyTo::new(self.email.trim(), self.name.trim()))
	}
}

/// Course consultation request; the submitter expects a follow-up.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationForm {
	/// Submitter's name.
	pub name: String,
	/// Submitter's email address; becomes the reply-to address.
	pub email: String,
	/// Optional phone number.
	#[serde(default)]
	pub phone: Option<String>,
	/// Optional company name.
	#[serde(default)]
	pub company: Option<String>,
	/// Course the consultation is about.
	pub course: String,
	/// Number of prospective participants.
	#[serde(default)]
	pub participants: Option<u32>,
	/// Preferred date, as typed by the submitter.
	#[serde(default)]
	pub preferred_date: Option<String>,
	/// Additional notes.
	#[serde(default)]
	pub message: Option<String>,
}
impl ConsultationForm {
	/// Renders the submission for the consultation recipients.
	pub fn to_email_request(&self, recipients: &FormRecipients) -> EmailRequest {
		let mut body = String::from("<h2>New consultation request</h2>\n<ul>\n");

		push_field(&mut body, "Course", &self.course);
		push_field(&mut body, "Name", &self.name);
		push_field(&mut body, "Email", &self.email);
		push_optional_field(&mut body, "Phone", self.phone.as_deref());
		push_optional_field(&mut body, "Company", self.company.as_deref());
		push_optional_field(
			&mut body,
			"Participants",
			self.participants.map(|count| count.to_string()).as_deref(),
		);
		push_optional_field(&mut body, "Preferred date", self.preferred_date.as_deref());
		body.push_str("</ul>\n");

		if let Some(message) = self.message.as_deref() {
			push_paragraph(&mut body, message);
		}

		EmailRequest::new(
			format!("Consultation request: {}", self.course.trim()),
			body,
			recipients.consultation.iter().cloned(),
		)
		.with_reply_to(ReplyTo::new(self.email.trim(), self.name.trim()))
	}
}

/// Escapes the five HTML-significant characters.
pub fn html_escape(raw: &str) -> String {
	let mut escaped = String::with_capacity(raw.len());

	for c in raw.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#x27;"),
			_ => escaped.push(c),
		}
	}

	escaped
}

fn push_field(body: &mut String, label: &str, value: &str) {
	// Writing into a `String` cannot fail.
	let _ = writeln!(body, "<li><strong>{label}:</strong> {}</li>", html_escape(value.trim()));
}

fn push_optional_field(body: &mut String, label: &str, value: Option<&str>) {
	if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
		push_field(body, label, value);
	}
}

fn push_paragraph(body: &mut String, text: &str) {
	let text = text.trim();

	if text.is_empty() {
		return;
	}

	let _ = writeln!(body, "<p>{}</p>", html_escape(text).replace('\n', "<br>"));
}
