use guided_decoding::prelude::*;

/// Reads a JSON schema on stdin, prints its regex and the size of its automaton.
///
/// An optional first argument replaces the default whitespace pattern.
fn main() -> Result<(), guided_decoding::Error> {
    let whitespace_pattern = std::env::args().nth(1);
    let schema: serde_json::Value = serde_json::from_reader(std::io::stdin())
        .map_err(JsonSchemaParserError::SerdeJsonError)?;
    let regex = json_schema::regex_from_value(&schema, whitespace_pattern.as_deref())?;
    println!("Regex: {}", regex);
    println!("Regex len: {}", regex.len());

    let dfa = Dfa::new(&regex)?;
    println!("DFA states: {}", dfa.num_states());
    println!("DFA final states: {}", dfa.final_states().len());
    println!("DFA byte classes: {}", dfa.alphabet_len());
    Ok(())
}
