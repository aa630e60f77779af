// src/context/bands.rs — Confidence bands and the behavior each one allows

use crate::infra::config::{BandThresholds, Language};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    MediumHigh,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64, t: &BandThresholds) -> Self {
        if confidence >= t.high {
            Self::High
        } else if confidence >= t.medium_high {
            Self::MediumHigh
        } else if confidence >= t.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::MediumHigh => "medium-high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Machine-readable behavior the model is held to. Medium and low both
    /// ask exactly one consolidated question; they differ only in wording.
    pub fn directive(&self) -> &'static str {
        match self {
            Self::High => "act-autonomously",
            Self::MediumHigh => "act-with-one-click-confirm",
            Self::Medium | Self::Low => "ask-one-consolidated-question",
        }
    }

    pub fn instruction(&self, language: Language) -> &'static str {
        match (language, self) {
            (Language::En, Self::High) => {
                "Confidence is high: there is ample history for this transaction. \
                 Create the entry directly without asking the user to confirm the accounts, \
                 then briefly report what was booked."
            }
            (Language::En, Self::MediumHigh) => {
                "Confidence is medium-high. Use the recommended action, create a draft entry, \
                 and ask the user for a single one-click confirmation. Do not ask field by field."
            }
            (Language::En, Self::Medium) => {
                "Confidence is medium. Present one or two candidate actions and let the user pick. \
                 Put everything that needs confirming into one consolidated question. \
                 Never split it across several rounds."
            }
            (Language::En, Self::Low) => {
                "Confidence is low: history is thin. Extract everything you can first, then list \
                 every open item in one structured confirmation and ask once. \
                 Never ask for fields one at a time."
            }
            (Language::Ja, Self::High) => {
                "確信度：高。十分な過去データがあります。確認なしで伝票を作成し、結果を簡潔に報告してください。"
            }
            (Language::Ja, Self::MediumHigh) => {
                "確信度：中高。推奨案で伝票の下書きを作成し、ワンクリックでの確認を求めてください。項目ごとの質問は禁止です。"
            }
            (Language::Ja, Self::Medium) => {
                "確信度：中。1〜2個の候補を提示して選んでもらい、確認事項は1回の質問にまとめてください。複数ラウンドに分けないこと。"
            }
            (Language::Ja, Self::Low) => {
                "確信度：低。データ抽出後、未確定項目を確認カードにまとめて一括確認を求めてください。項目ごとの個別質問は禁止です。"
            }
            (Language::Zh, Self::High) => {
                "置信度：高。历史参考充分。直接创建凭证，无需向用户确认科目，完成后简要告知结果。"
            }
            (Language::Zh, Self::MediumHigh) => {
                "置信度：中高。按推荐方案创建凭证草稿，让用户一键确认或修改。不要逐项提问。"
            }
            (Language::Zh, Self::Medium) => {
                "置信度：中。给出1-2个候选方案供用户选择，所有待确认信息合并在一次提问中。不要分多轮提问。"
            }
            (Language::Zh, Self::Low) => {
                "置信度：低。先完成数据提取，再用一个确认卡片列出所有待确认项，让用户一次性确认。不要逐个字段提问。"
            }
        }
    }
}
