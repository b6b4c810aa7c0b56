// self
use crate::{_prelude::*, mail::EmailRequest};

/// Graph `sendMail` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendMailPayload<'a> {
	message: Message<'a>,
	save_to_sent_items: bool,
}
impl<'a> SendMailPayload<'a> {
	pub(crate) fn from_request(request: &'a EmailRequest) -> Self {
		let reply_to = request.reply_to.as_ref().map(|reply_to| {
			vec![Recipient {
				email_address: EmailAddress {
					address: &reply_to.email,
					name: Some(reply_to.name.as_str()).filter(|name| !name.trim().is_empty()),
				},
			}]
		});

		Self {
			message: Message {
				subject: &request.subject,
				body: Body { content_type: "HTML", content: &request.html_body },
				to_recipients: request
					.recipients
					.iter()
					.map(|address| Recipient {
						email_address: EmailAddress { address, name: None },
					})
					.collect(),
				reply_to,
			},
			save_to_sent_items: true,
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Message<'a> {
	subject: &'a str,
	body: Body<'a>,
	to_recipients: Vec<Recipient<'a>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	reply_to: Option<Vec<Recipient<'a>>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Body<'a> {
	content_type: &'static str,
	content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Recipient<'a> {
	email_address: EmailAddress<'a>,
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
	address: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	name: Option<&'a str>,
}
