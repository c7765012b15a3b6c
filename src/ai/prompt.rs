//! Reusable prompts using Handlebars for templating. Strict mode is on
//! so a missing field fails loudly instead of rendering an empty hole.

use std::fmt;

use handlebars::{Handlebars, handlebars_helper, no_escape};

// Natural numbering for `@index` inside `each`
handlebars_helper!(inc: |v: i64| format!("{}", v + 1));

#[derive(Debug)]
pub enum Prompt {
    EmailQuestion,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<Prompt> for String {
    fn from(item: Prompt) -> String {
        format!("{:?}", item)
    }
}

const EMAIL_QUESTION_PROMPT: &str = r"
Use the following email content to answer the question.

Email Content:
{{#each documents}}
### Email {{inc @index}}

{{content}}

---

{{/each}}
Question: {{question}}

Please provide a helpful and accurate answer based only on the email content above. If the information is not available in the emails, please say so clearly.

Answer:
";

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Prompts are plain text, HTML escaping would mangle addresses like <a@b.com>
    registry.register_escape_fn(no_escape);
    registry.register_helper("inc", Box::new(inc));
    registry
        .register_template_string(&Prompt::EmailQuestion.to_string(), EMAIL_QUESTION_PROMPT)
        .expect("Failed to register template");
    registry
}
