use indictment_relay::config::RelaySettings;
use indictment_relay::streaming::{RelaySession, SessionState};

/// A captured upstream body, including the leading blank-line artifacts
const CAPTURED: &str = concat!(
    "data: {\"choices\":[{\"text\":\"\\n\",\"index\":0}]}\n\n",
    "data: {\"choices\":[{\"text\":\"\\n\",\"index\":0}]}\n\n",
    "data: {\"choices\":[{\"text\":\"民事起诉状\",\"index\":0}]}\n\n",
    "data: {\"choices\":[{\"text\":\"\\n\\n原告：张三\",\"index\":0}]}\n\n",
    "data: {\"choices\":[{\"text\":\"\\n被告：李四\",\"index\":0}]}\n\n",
    "data: {\"choices\":[{\"text\":\"\\n诉讼请求：退还押金三千元。\",\"index\":0}]}\n\n",
    "data: [DONE]\n\n",
);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Streaming Relay Replay Demo\n");
    println!("{}", "=".repeat(80));

    let mut session = RelaySession::new(RelaySettings::default());
    let mut text = String::new();

    // Simulate small network chunks
    for (i, chunk) in CAPTURED.as_bytes().chunks(23).enumerate() {
        let outcome = session.process_chunk(chunk);
        if let Some(e) = outcome.error {
            return Err(e.into());
        }

        if outcome.forwarded.is_empty() {
            println!("Chunk {:>2} ({} bytes): buffering...", i + 1, chunk.len());
            continue;
        }

        for bytes in outcome.forwarded {
            let token = String::from_utf8(bytes.to_vec())?;
            println!("Chunk {:>2} ({} bytes): forwarded {:?}", i + 1, chunk.len(), token);
            text.push_str(&token);
        }
    }

    println!("\n{}", "=".repeat(80));
    println!("Session state: {:?}", session.state());
    println!("Tokens forwarded: {}", session.tokens_forwarded());
    println!("\n{}", text);

    if session.state() != SessionState::ClosedOk {
        return Err("upstream ended before [DONE]".into());
    }

    Ok(())
}
