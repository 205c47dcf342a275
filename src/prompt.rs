//! Prompt composition for the indictment drafter.
//!
//! The persona paragraph is fixed; only the fact description and the appeal
//! vary per request.

use crate::models::GenerateIndictmentBody;

const PERSONA: &str = "你是一个金牌律师，专注于解决房屋租赁纠纷，你非常严谨并且精通中国法律，你有良好的职业道德并且充分的站在你的委托人的立场，你可以根据委托人提供的事实描述和诉求为委托人编写符合中国法律的起诉书，在起诉书中请你用清晰的逻辑描述事实缘由，如果有必要请在起诉书中附上相关中国法律条款。";

const INSTRUCTION: &str = "请你为你的委托人写一封起诉书，以下是你的委托人提供的资料：";

/// Render the full prompt. Both fields are interpolated exactly as given.
pub fn compose(fact: &str, appeal: &str) -> String {
    format!("\n{PERSONA}\n{INSTRUCTION}\n\n事实描述：\n{fact}\n\n诉求：\n{appeal}\n")
}

pub fn compose_from_body(body: &GenerateIndictmentBody) -> String {
    compose(&body.fact, &body.appeal)
}
