//! The two fixed statement locales.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language used for statement labels, notices and the default subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Zh,
    En,
}

/// Fixed strings for one locale.
#[derive(Debug, Clone, Copy)]
pub struct Labels {
    pub title: &'static str,
    pub date_caption: &'static str,
    pub salutation: &'static str,
    pub note: &'static str,
    pub item_header: &'static str,
    pub amount_header: &'static str,
    pub footer: &'static str,
    pub password_notice: &'static str,
    pub unknown_recipient: &'static str,
    pub missing_email: &'static str,
    pub mismatch_reason: &'static str,
    pub default_subject_format: &'static str,
}

const ZH: Labels = Labels {
    title: "工资明细",
    date_caption: "日期",
    salutation: "尊敬的 {name}：",
    note: "以下为您本期的薪酬明细，如有疑问请及时与人事部门联系。",
    item_header: "项目",
    amount_header: "金额",
    footer: "本文件包含个人薪酬保密信息，仅限收件人本人查阅，请勿转发。",
    password_notice: "附件PDF已加密，打开密码为：",
    unknown_recipient: "未知",
    missing_email: "无邮箱",
    mismatch_reason: "姓名与邮箱不匹配，请人工核对",
    default_subject_format: "%d/%m/%Y明细",
};

const EN: Labels = Labels {
    title: "Salary Statement",
    date_caption: "Date",
    salutation: "Dear {name},",
    note: "Below is your compensation breakdown for this period. Please contact HR with any questions.",
    item_header: "Item",
    amount_header: "Amount",
    footer: "This document contains confidential compensation information intended only for the recipient. Do not forward.",
    password_notice: "The attached PDF is password protected. Open password: ",
    unknown_recipient: "unknown",
    missing_email: "no email",
    mismatch_reason: "name does not match email address, please check manually",
    default_subject_format: "Salary statement %d/%m/%Y",
};

impl Locale {
    pub fn labels(self) -> &'static Labels {
        match self {
            Self::Zh => &ZH,
            Self::En => &EN,
        }
    }

    /// Language tag passed to the typesetter.
    pub fn lang_tag(self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
        }
    }

    /// Long date for the statement body.
    pub fn format_date(self, date: chrono::NaiveDate) -> String {
        match self {
            Self::Zh => date.format("%Y年%m月%d日").to_string(),
            Self::En => date.format("%d %B %Y").to_string(),
        }
    }
}

impl Labels {
    pub fn salutation_for(&self, name: &str) -> String {
        self.salutation.replace("{name}", name)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lang_tag())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "cn" => Ok(Self::Zh),
            "en" | "en-us" | "en-gb" => Ok(Self::En),
            other => Err(format!("unsupported locale '{other}', expected zh or en")),
        }
    }
}
