//! 코멘트/PR 설명 Markdown 렌더링 구현.

use crate::application::ports::CommentRenderer;
use crate::domain::policy::{RESULT_BOUNDARY, completion_marker, progress_marker};
use crate::domain::review::{ReviewMode, Suggestion};

const DESCRIPTION_START: &str = "<!-- yunpilot summary start -->";
const DESCRIPTION_END: &str = "<!-- yunpilot summary end -->";

pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommentRenderer for MarkdownRenderer {
    fn render_progress(&self, mode: ReviewMode) -> String {
        format!(
            "{}\n\n{} phase in progress...",
            progress_marker(mode),
            mode.display_name()
        )
    }

    fn render_phase_result(&self, mode: ReviewMode, result: &str, elapsed_secs: f64) -> String {
        // 마커와 경계 사이의 본문이 곧 캐시 복원 대상이므로 결과 외 텍스트를 넣지 않는다.
        format!(
            "{}\n\n{}{}_{} phase completed in {:.1}s_",
            completion_marker(mode),
            result.trim(),
            RESULT_BOUNDARY,
            mode.display_name(),
            elapsed_secs,
        )
    }

    fn render_phase_error(&self, mode: ReviewMode, error: &str) -> String {
        // 완료 마커를 넣지 않아야 다음 실행에서 캐시로 오인되지 않는다.
        format!("## {} phase failed\n\n{}", mode.display_name(), error)
    }

    fn render_posting_progress(&self, posted: usize, total: usize) -> String {
        format!(
            "{}\n\nPosting inline comments: {posted}/{total}...",
            progress_marker(ReviewMode::Comments)
        )
    }

    fn render_comments_done(
        &self,
        result: &str,
        posted: usize,
        attempted: usize,
        elapsed_secs: f64,
    ) -> String {
        format!(
            "{}\n\n{}{}_Comments phase completed in {:.1}s; posted {posted}/{attempted} inline comments_",
            completion_marker(ReviewMode::Comments),
            result.trim(),
            RESULT_BOUNDARY,
            elapsed_secs,
        )
    }

    fn render_inline_suggestion(&self, suggestion: &Suggestion) -> String {
        let mut out = String::new();
        if let Some(category) = &suggestion.category {
            out.push_str(&format!("**[{category}]** "));
        }
        if let Some(summary) = &suggestion.summary {
            out.push_str(summary.trim());
            out.push_str("\n\n");
        }
        out.push_str(suggestion.content.trim());
        if let Some(code) = &suggestion.improved_code {
            out.push_str(&format!("\n\nSuggested change:\n```\n{}\n```", code.trim_end()));
        }
        out
    }

    fn render_global_suggestion(&self, suggestion: &Suggestion) -> String {
        let mut out = String::new();
        if let Some(category) = &suggestion.category {
            out.push_str(&format!("**[{category}]** "));
        }
        // 인라인 앵커가 없는 제안은 파일 참조를 본문에 남긴다.
        if let Some(file) = suggestion.file.as_deref().filter(|f| !f.trim().is_empty()) {
            out.push_str(&format!("`{file}`: "));
        }
        if let Some(summary) = &suggestion.summary {
            out.push_str(summary.trim());
            out.push_str("\n\n");
        }
        out.push_str(suggestion.content.trim());
        if let Some(code) = &suggestion.improved_code {
            out.push_str(&format!("\n\nSuggested change:\n```\n{}\n```", code.trim_end()));
        }
        out
    }

    fn render_description(&self, original: &str, summary: &str) -> String {
        let block = format!(
            "{DESCRIPTION_START}\n## Review Summary\n\n{}\n{DESCRIPTION_END}",
            summary.trim()
        );

        // 기존 블록이 있으면 교체해 반복 실행에도 결과가 같도록 한다.
        if let (Some(start), Some(end)) = (original.find(DESCRIPTION_START), original.rfind(DESCRIPTION_END)) {
            if start < end {
                let before = original[..start].trim_end();
                let after = original[end + DESCRIPTION_END.len()..].trim_start();
                let mut out = String::new();
                if !before.is_empty() {
                    out.push_str(before);
                    out.push_str("\n\n");
                }
                out.push_str(&block);
                if !after.is_empty() {
                    out.push_str("\n\n");
                    out.push_str(after);
                }
                return out;
            }
        }

        if original.trim().is_empty() {
            block
        } else {
            format!("{}\n\n{}", original.trim_end(), block)
        }
    }
}
