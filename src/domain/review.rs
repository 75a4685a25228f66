//! 리뷰 도메인 엔티티/값 객체.

use serde::Serialize;

/// 리뷰 실행 대상 PR 선택 방식.
#[derive(Debug, Clone)]
pub enum PrSelector {
    /// 소스/타깃 브랜치 쌍으로 열린 PR을 탐색한다.
    Branches { source: String },
    /// 로컬 ID로 특정 PR을 직접 지정한다.
    LocalId(u64),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub selector: PrSelector,
    pub target_branch: String,
    pub modes: ReviewModeSet,
    pub force_regenerate: bool,
    /// true면 코멘트/설명 쓰기를 콘솔 출력으로 대체한다.
    pub dry_run: bool,
}

/// PR 식별 정보.
/// `to_patch_set_id`는 항상 최신 리비전, `from_patch_set_id`는 현재 diff 범위의 기준 리비전.
#[derive(Debug, Clone)]
pub struct PullRequestRef {
    pub local_id: u64,
    pub title: String,
    pub description: String,
    pub source_branch: String,
    pub target_branch: String,
    pub from_patch_set_id: String,
    pub to_patch_set_id: String,
}

/// 코멘트에 부착된 patch set 주석.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedPatchSet {
    pub version_no: u32,
    pub patch_set_id: String,
}

/// 코멘트 스토어에서 조회한 기존 코멘트 레코드.
#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub id: String,
    pub content: String,
    pub related_patchset: Option<RelatedPatchSet>,
}

/// 리뷰 단계. 의존 순서는 summary → analysis → comments로 고정이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewMode {
    Summary,
    Analysis,
    Comments,
}

impl ReviewMode {
    /// 마커/설정 키로 쓰는 내부 식별자.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Analysis => "analysis",
            Self::Comments => "comments",
        }
    }

    /// 코멘트 본문에 표시하는 이름.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Summary => "Summary",
            Self::Analysis => "Analysis",
            Self::Comments => "Comments",
        }
    }

    /// 의존 순서대로 전체 단계를 나열한다.
    pub fn ordered() -> [ReviewMode; 3] {
        [Self::Summary, Self::Analysis, Self::Comments]
    }
}

/// 활성화된 단계 집합. 나열 순서는 항상 `ReviewMode::ordered()`를 따른다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewModeSet {
    summary: bool,
    analysis: bool,
    comments: bool,
}

impl Default for ReviewModeSet {
    fn default() -> Self {
        Self::all()
    }
}

impl ReviewModeSet {
    pub fn all() -> Self {
        Self {
            summary: true,
            analysis: true,
            comments: true,
        }
    }

    pub fn empty() -> Self {
        Self {
            summary: false,
            analysis: false,
            comments: false,
        }
    }

    /// "summary,analysis,comments" 형태의 라벨 목록을 해석한다.
    pub fn from_labels(labels: &str) -> Result<Self, String> {
        let mut set = Self::empty();
        for label in labels.split(',').map(str::trim).filter(|l| !l.is_empty()) {
            match label.to_ascii_lowercase().as_str() {
                "summary" => set.summary = true,
                "analysis" => set.analysis = true,
                "comments" => set.comments = true,
                other => return Err(format!("unknown review mode '{other}'")),
            }
        }
        if set == Self::empty() {
            return Err("no review modes enabled".to_string());
        }
        Ok(set)
    }

    pub fn contains(&self, mode: ReviewMode) -> bool {
        match mode {
            ReviewMode::Summary => self.summary,
            ReviewMode::Analysis => self.analysis,
            ReviewMode::Comments => self.comments,
        }
    }

    /// 증분 리뷰에서 summary 단계를 강제 제외한 집합을 돌려준다.
    pub fn without_summary(mut self) -> Self {
        self.summary = false;
        self
    }

    /// 활성 단계를 의존 순서대로 나열한다.
    pub fn enabled(&self) -> Vec<ReviewMode> {
        ReviewMode::ordered()
            .into_iter()
            .filter(|m| self.contains(*m))
            .collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.enabled()
            .iter()
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

/// 모델 출력에서 파싱한 구조화 제안.
/// 파일과 라인이 모두 있어야 인라인 게시 대상이고, 아니면 글로벌 코멘트로 강등된다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub content: String,
    pub improved_code: Option<String>,
}

impl Suggestion {
    pub fn text_only(content: String) -> Self {
        Self {
            file: None,
            line: None,
            category: None,
            summary: None,
            content,
            improved_code: None,
        }
    }

    /// 인라인 게시 가능 여부(파일 + 라인 앵커 확보).
    pub fn is_inline(&self) -> bool {
        self.file.as_deref().is_some_and(|f| !f.trim().is_empty()) && self.line.is_some()
    }
}

/// 리뷰 범위 종류.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    /// 타깃↔소스 브랜치 전체 diff.
    Full,
    /// 마지막 리뷰된 patch set 이후의 증분 diff.
    Incremental { last_reviewed: String },
}

/// 범위 해석 결과: diff 본문과 유효 단계 집합.
#[derive(Debug, Clone)]
pub struct ResolvedScope {
    pub kind: ScopeKind,
    pub diff: String,
    pub modes: ReviewModeSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Completed,
    NoChanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostedCommentKind {
    Global,
    Inline,
}

/// 실제 게시된(또는 게시 시도된) 코멘트 기록.
#[derive(Debug, Clone, Serialize)]
pub struct PostedComment {
    pub kind: PostedCommentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewMetadata {
    pub elapsed_secs: f64,
    pub comments_posted: usize,
    pub word_count: usize,
}

/// 한 번의 실행이 만들어내는 최종 결과. 생성 이후 변경하지 않는다.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewResult {
    pub status: ReviewStatus,
    pub pr_id: u64,
    pub pr_title: String,
    pub modes: Vec<String>,
    pub summary: String,
    pub analysis: String,
    pub comments: Vec<PostedComment>,
    pub metadata: ReviewMetadata,
}

impl ReviewResult {
    /// 변경 없음 단락(short-circuit) 결과를 만든다.
    pub fn no_changes(pr: &PullRequestRef) -> Self {
        Self {
            status: ReviewStatus::NoChanges,
            pr_id: pr.local_id,
            pr_title: pr.title.clone(),
            modes: Vec::new(),
            summary: String::new(),
            analysis: String::new(),
            comments: Vec::new(),
            metadata: ReviewMetadata {
                elapsed_secs: 0.0,
                comments_posted: 0,
                word_count: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_set_labels_parse_in_dependency_order() {
        let set = ReviewModeSet::from_labels("comments, summary").unwrap();
        assert_eq!(set.enabled(), vec![ReviewMode::Summary, ReviewMode::Comments]);
    }

    #[test]
    fn mode_set_rejects_unknown_label() {
        assert!(ReviewModeSet::from_labels("summary,review").is_err());
    }

    #[test]
    fn without_summary_keeps_other_modes() {
        let set = ReviewModeSet::all().without_summary();
        assert!(!set.contains(ReviewMode::Summary));
        assert!(set.contains(ReviewMode::Analysis));
        assert!(set.contains(ReviewMode::Comments));
    }

    #[test]
    fn suggestion_without_line_is_not_inline() {
        let s = Suggestion {
            file: Some("a.py".into()),
            ..Suggestion::text_only("consider renaming".into())
        };
        assert!(!s.is_inline());
    }
}
