//! 모델 출력 복구/파싱.
//!
//! 모델은 JSON을 약속하지만 실제로는 산문에 싸인 JSON, 잘린 JSON, 순수 산문이
//! 섞여 온다. 이 모듈은 호출자에게 절대 오류를 던지지 않고 최선의 구조화
//! 데이터를 돌려준다. 우선순위: ```json 펜스 → 엄격 파싱 → 복구 후 재파싱 →
//! 레거시 라인 규약 → 불투명 텍스트 폴백.

use serde_json::Value;

use crate::domain::review::Suggestion;

/// 폴백 글로벌 제안에 담는 원문 최대 길이.
const FALLBACK_TEXT_LIMIT: usize = 2000;

/// ```json 펜스 블록이 있으면 그 내부를, 없으면 첫 괄호부터 마지막 괄호까지를
/// JSON 후보로 잘라낸다.
pub fn extract_json_candidate(raw: &str) -> Option<&str> {
    let lower = raw.to_ascii_lowercase();
    if let Some(fence) = lower.find("```json") {
        let after = &raw[fence + "```json".len()..];
        let block = match after.find("```") {
            Some(end) => &after[..end],
            None => after,
        };
        let block = block.trim();
        if !block.is_empty() {
            return Some(block);
        }
    }

    let open = raw.find(['{', '['])?;
    let close = raw.rfind(['}', ']']);
    match close {
        Some(close) if close > open => Some(raw[open..=close].trim()),
        // 닫는 괄호가 없는 잘린 출력도 복구 대상으로 넘긴다.
        _ => Some(raw[open..].trim()),
    }
}

/// 관대한 JSON 복구 패스.
/// 따옴표 정규화, 후행 콤마 제거, 잘린 문자열/괄호 닫기까지만 수행한다.
pub fn repair_json(input: &str) -> String {
    let normalized: String = input
        .chars()
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();

    let mut out = String::with_capacity(normalized.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in normalized.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' => {
                stack.push('}');
                out.push(c);
            }
            '[' => {
                stack.push(']');
                out.push(c);
            }
            '}' | ']' => {
                // 후행 콤마 제거: `,}` / `,]`
                while out.ends_with(',') || out.ends_with(char::is_whitespace) {
                    let trimmed = out.trim_end_matches(char::is_whitespace).to_string();
                    if trimmed.ends_with(',') {
                        out = trimmed[..trimmed.len() - 1].to_string();
                    } else {
                        out = trimmed;
                        break;
                    }
                }
                if stack.last() == Some(&c) {
                    stack.pop();
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    // 잘린 출력 마감: 열린 문자열과 괄호를 역순으로 닫는다.
    if in_string {
        out.push('"');
    }
    while out.trim_end().ends_with(',') {
        out = out.trim_end().trim_end_matches(',').to_string();
    }
    while let Some(close) = stack.pop() {
        out.push(close);
    }
    out
}

/// 엄격 파싱 → 후보 추출 → 복구 재파싱 순으로 JSON 값을 얻는다.
pub fn parse_model_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let candidate = extract_json_candidate(trimmed)?;
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Some(value);
    }

    serde_json::from_str(&repair_json(candidate)).ok()
}

/// comments 단계 원문을 제안 목록으로 파싱한다. 어떤 입력에서도 실패하지 않는다.
/// 비어 있지 않은데 해석 불가능한 입력만 원문을 담은 불투명 제안 1개로 강등되고,
/// 빈 입력이나 정상적인 빈 목록은 빈 결과를 돌려준다.
pub fn parse_suggestions(raw: &str) -> Vec<Suggestion> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    // 인식 가능한 JSON 컨테이너면 빈 목록도 그대로 믿는다.
    // "지적 없음" 응답을 불투명 텍스트로 강등하지 않기 위해서다.
    if let Some(value) = parse_model_json(raw)
        && let Some(suggestions) = suggestions_from_value(&value)
    {
        return suggestions;
    }

    // 레거시 라인 규약: "- File: path, Line: 42, Type: style, Comment: text"
    let line_based = parse_legacy_lines(raw);
    if !line_based.is_empty() {
        return line_based;
    }

    vec![Suggestion::text_only(truncate_chars(raw.trim(), FALLBACK_TEXT_LIMIT))]
}

/// 최상위 객체의 "comments" 배열 또는 최상위 배열에서 제안을 수집한다.
/// 인식할 수 없는 형태면 None을 돌려 폴백 경로로 넘긴다.
fn suggestions_from_value(value: &Value) -> Option<Vec<Suggestion>> {
    let items = match value {
        Value::Object(map) => map.get("comments").and_then(Value::as_array)?.as_slice(),
        Value::Array(arr) => arr.as_slice(),
        _ => return None,
    };

    Some(items.iter().filter_map(suggestion_from_item).collect())
}

fn suggestion_from_item(item: &Value) -> Option<Suggestion> {
    let map = item.as_object()?;

    let content = ["content", "comment", "suggestion"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    let file = map
        .get("file")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(Suggestion {
        file,
        line: map.get("line").and_then(parse_line_anchor),
        category: string_field(map, &["category", "type"]),
        summary: string_field(map, &["summary"]),
        content,
        improved_code: string_field(map, &["improved_code", "code"]),
    })
}

fn string_field(map: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 라인 앵커 해석: 정수, "42", "42-50" 범위(첫 라인 사용)를 허용한다.
/// 0 또는 음수는 미상으로 취급해 None을 돌려준다.
fn parse_line_anchor(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().filter(|&v| v > 0).map(|v| v as u32),
        Value::String(s) => {
            let first = s.split(['-', ':']).next()?.trim();
            first.parse::<u32>().ok().filter(|&v| v > 0)
        }
        _ => None,
    }
}

/// 구버전 텍스트 규약 파서. JSON 경로가 아무 것도 내지 못했을 때만 쓴다.
fn parse_legacy_lines(raw: &str) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        let Some(body) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) else {
            continue;
        };

        let parts: Vec<&str> = body.split(", ").collect();
        let field = |prefix: &str| {
            parts.iter().find_map(|p| {
                let lower = p.to_ascii_lowercase();
                lower
                    .starts_with(prefix)
                    .then(|| p.split_once(':').map(|(_, v)| v.trim().to_string()))
                    .flatten()
            })
        };

        let file = field("file:").filter(|f| !f.is_empty());
        let line_no = field("line:").and_then(|v| {
            parse_line_anchor(&Value::String(v))
        });
        let category = field("type:");
        let content = field("comment:").unwrap_or_else(|| body.to_string());

        if content.is_empty() {
            continue;
        }

        suggestions.push(Suggestion {
            file,
            line: line_no,
            category,
            summary: None,
            content,
            improved_code: None,
        });
    }

    suggestions
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_object_with_comments_array() {
        let raw = r#"{"comments":[{"file":"src/app.py","line":42,"category":"style","content":"Prefer with-statement"}]}"#;
        let parsed = parse_suggestions(raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].file.as_deref(), Some("src/app.py"));
        assert_eq!(parsed[0].line, Some(42));
        assert_eq!(parsed[0].category.as_deref(), Some("style"));
    }

    #[test]
    fn fenced_json_wrapped_in_prose_is_extracted() {
        let raw = "Here is my review.\n```json\n[{\"file\":\"a.rs\",\"line\":3,\"content\":\"check overflow\"}]\n```\nDone.";
        let parsed = parse_suggestions(raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].line, Some(3));
    }

    #[test]
    fn trailing_comma_and_truncation_are_repaired() {
        let raw = r#"{"comments":[{"file":"a.rs","line":7,"content":"unclosed"#;
        let parsed = parse_suggestions(raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].content, "unclosed");

        let raw = r#"{"comments":[{"file":"b.rs","line":1,"content":"x",},]}"#;
        let parsed = parse_suggestions(raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].file.as_deref(), Some("b.rs"));
    }

    #[test]
    fn malformed_output_never_fails_and_keeps_content() {
        // 스펙의 단골 예: JSON도 라인 규약도 아닌 산문.
        let raw = "Sure, here's my review: {file: a.py, line 5, do X";
        let parsed = parse_suggestions(raw);
        assert_eq!(parsed.len(), 1);
        assert!(!parsed[0].content.is_empty());
        assert!(parsed[0].file.is_none());
    }

    #[test]
    fn legacy_line_convention_is_parsed() {
        let raw = "ISSUES:\n- File: src/db.py, Line: 89, Type: security, Comment: SQL injection risk\n- File: src/db.py, Comment: missing index";
        let parsed = parse_suggestions(raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].line, Some(89));
        assert_eq!(parsed[0].category.as_deref(), Some("security"));
        // 라인 없는 항목은 버리지 않고 앵커 없는 제안으로 유지한다.
        assert_eq!(parsed[1].line, None);
        assert_eq!(parsed[1].file.as_deref(), Some("src/db.py"));
    }

    #[test]
    fn line_ranges_use_first_line_and_zero_means_unknown() {
        let raw = r#"{"comments":[
            {"file":"a.rs","line":"12-20","content":"range"},
            {"file":"b.rs","line":0,"content":"unknown"}
        ]}"#;
        let parsed = parse_suggestions(raw);
        assert_eq!(parsed[0].line, Some(12));
        assert_eq!(parsed[1].line, None);
    }

    #[test]
    fn empty_comments_array_means_nothing_to_post() {
        // "지적 없음"을 뜻하는 정상 응답이 폴백 텍스트로 강등되면 안 된다.
        assert!(parse_suggestions(r#"{"comments": []}"#).is_empty());
        assert!(parse_suggestions("```json\n[]\n```").is_empty());
    }

    #[test]
    fn empty_input_yields_no_suggestions() {
        assert!(parse_suggestions("   \n").is_empty());
    }
}
