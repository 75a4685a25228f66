//! 도메인 정책(단계 마커, 코멘트 기반 캐시 복원, 범위 선택, 프롬프트 구성).

use crate::domain::review::{CommentRecord, PullRequestRef, RelatedPatchSet, ReviewMode};

/// 단계 결과 코멘트와 본문 푸터를 구분하는 수평선 경계.
pub const RESULT_BOUNDARY: &str = "\n\n---\n";

/// summary 비활성 시 analysis에, analysis 비활성 시 comments에 주입하는 대체 컨텍스트.
pub const DISABLED_CONTEXT_PLACEHOLDER: &str = "(previous phase disabled; no upstream context)";

/// 단계 완료 코멘트를 식별하는 마커 문자열을 만든다.
pub fn completion_marker(mode: ReviewMode) -> String {
    format!("<!-- yunpilot phase={} done -->", mode.as_str())
}

/// 단계 진행중 코멘트를 식별하는 마커 문자열을 만든다.
pub fn progress_marker(mode: ReviewMode) -> String {
    format!("<!-- yunpilot phase={} running -->", mode.as_str())
}

pub fn find_comment_with_marker<'a>(
    comments: &'a [CommentRecord],
    marker: &str,
) -> Option<&'a CommentRecord> {
    comments.iter().find(|c| c.content.contains(marker))
}

/// 완료 마커 뒤의 본문을 결과 텍스트로 복원한다.
/// 마커가 없으면 None(빈 결과와 구분), 경계(`---` 푸터)가 있으면 그 앞까지만 취한다.
pub fn cached_phase_result(comments: &[CommentRecord], mode: ReviewMode) -> Option<String> {
    let marker = completion_marker(mode);
    let comment = find_comment_with_marker(comments, &marker)?;
    let after = comment.content.split_once(&marker)?.1;
    let body = match after.find(RESULT_BOUNDARY) {
        Some(idx) => &after[..idx],
        None => after,
    };
    Some(body.trim().to_string())
}

/// 마지막으로 리뷰된 patch set을 고른다.
/// related patch set 주석이 달린 코멘트 중 version_no가 가장 큰 것이 기준이다.
pub fn last_reviewed_patch_set(comments: &[CommentRecord]) -> Option<&RelatedPatchSet> {
    comments
        .iter()
        .filter_map(|c| c.related_patchset.as_ref())
        .max_by_key(|ps| ps.version_no)
}

/// 코멘트 캐시를 게시/갱신 결과로 동기화한다.
pub fn upsert_comment_cache(comments: &mut Vec<CommentRecord>, comment: CommentRecord) {
    if let Some(idx) = comments.iter().position(|c| c.id == comment.id) {
        comments[idx] = comment;
    } else {
        comments.push(comment);
    }
}

/// 시스템+사용자 프롬프트 토큰 한도 점검용 추정치.
/// 정확한 토크나이저 대신 단어 수와 바이트/4 중 큰 값을 쓴다(보수적 근사).
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    words.max(text.len() / 4)
}

fn pr_header(pr: &PullRequestRef) -> String {
    format!(
        "PR Title: {}\nPR Description: {}\nSource Branch: {}\nTarget Branch: {}\n",
        pr.title,
        if pr.description.trim().is_empty() {
            "(no description)"
        } else {
            pr.description.as_str()
        },
        pr.source_branch,
        pr.target_branch,
    )
}

/// summary 단계 사용자 프롬프트를 만든다.
pub fn build_summary_prompt(pr: &PullRequestRef, diff: &str) -> String {
    format!(
        "Generate a concise summary for this pull request.\n\n{}\nGit Diff:\n{}\n\nOutput: 3-6 bullet points summarizing the intent and scope.",
        pr_header(pr),
        diff,
    )
}

/// analysis 단계 사용자 프롬프트를 만든다. summary 결과(또는 대체 텍스트)를 컨텍스트로 주입한다.
pub fn build_analysis_prompt(pr: &PullRequestRef, diff: &str, summary_context: &str) -> String {
    format!(
        "Using the provided summary and diff, identify potential issues, risky areas, and improvement suggestions.\n\n{}\nSUMMARY PROVIDED:\n{}\n\nGIT DIFF:\n{}\n\nReturn a structured analysis with sections: Risks, Findings, Suggestions.",
        pr_header(pr),
        summary_context,
        diff,
    )
}

/// comments 단계 사용자 프롬프트를 만든다. analysis 결과를 컨텍스트로 주입하고 STRICT JSON을 요구한다.
pub fn build_comments_prompt(pr: &PullRequestRef, diff: &str, analysis_context: &str) -> String {
    format!(
        "Based on the analysis and the diff, propose inline review comments. \
Return STRICT JSON with a top-level \"comments\" array (no extra text) where each item has keys: \
\"file\" (string path), \"line\" (integer line number if known else null), \"category\" (one of security/performance/style/correctness), \
\"summary\" (one sentence), \"content\" (string), \"improved_code\" (optional string).\n\n{}\nANALYSIS:\n{}\n\nDIFF:\n{}\n\nJSON ONLY.",
        pr_header(pr),
        analysis_context,
        diff,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str, content: &str) -> CommentRecord {
        CommentRecord {
            id: id.to_string(),
            content: content.to_string(),
            related_patchset: None,
        }
    }

    #[test]
    fn cached_result_is_recovered_after_marker() {
        let body = format!(
            "{}\n\nAll good.\n\nMinor nit in a.py.{}_elapsed 3s_",
            completion_marker(ReviewMode::Summary),
            RESULT_BOUNDARY,
        );
        let comments = vec![comment("1", &body)];
        let cached = cached_phase_result(&comments, ReviewMode::Summary).unwrap();
        assert_eq!(cached, "All good.\n\nMinor nit in a.py.");
    }

    #[test]
    fn cached_result_distinguishes_missing_from_empty() {
        let comments = vec![comment("1", "ordinary human comment")];
        assert!(cached_phase_result(&comments, ReviewMode::Summary).is_none());

        let empty = format!("{}\n\n{}", completion_marker(ReviewMode::Summary), RESULT_BOUNDARY);
        let comments = vec![comment("2", &empty)];
        assert_eq!(
            cached_phase_result(&comments, ReviewMode::Summary).as_deref(),
            Some("")
        );
    }

    #[test]
    fn last_reviewed_picks_highest_version() {
        let mut one = comment("1", "reviewed");
        one.related_patchset = Some(RelatedPatchSet {
            version_no: 1,
            patch_set_id: "ps-1".into(),
        });
        let mut two = comment("2", "reviewed again");
        two.related_patchset = Some(RelatedPatchSet {
            version_no: 2,
            patch_set_id: "ps-2".into(),
        });
        let comments = vec![one, two, comment("3", "no annotation")];
        assert_eq!(
            last_reviewed_patch_set(&comments).map(|p| p.patch_set_id.as_str()),
            Some("ps-2")
        );
    }

    #[test]
    fn token_estimate_scales_with_length() {
        assert!(estimate_tokens("hello world") >= 2);
        let long = "x".repeat(4000);
        assert!(estimate_tokens(&long) >= 1000);
    }
}
