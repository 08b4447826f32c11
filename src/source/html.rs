//! 基于 scraper 的试题页面实现
//!
//! 对应学习通作业/考试回顾页的固定结构：
//! `.mark_item`（题型）→ `.questionLi`（题目）→ `.mark_name` / `.mark_letter` / `.mark_answer`

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::error::SourceError;
use crate::source::document::{ImageCandidate, QuestionFields, QuizDocument};

const SECTION_SELECTOR: &str = ".mark_item";
const SECTION_LABEL_SELECTOR: &str = ".type_tit";
const QUESTION_SELECTOR: &str = ".questionLi";
const PROMPT_SELECTOR: &str = ".mark_name";
const OPTIONS_SELECTOR: &str = ".mark_letter";
const OPTION_ITEM_SELECTOR: &str = "li";
const CORRECT_ANSWER_SELECTOR: &str = ".mark_answer .colorGreen";
const USER_ANSWER_SELECTOR: &str = ".mark_answer .colorDeep";
const PAGE_TITLE_SELECTOR: &str = ".mark_title";
const BASE_SELECTOR: &str = "base[href]";
const IMG_SELECTOR: &str = "img";
const IMAGE_CONTAINER_SELECTOR: &str = ".imag_box, .mark_img, .imgBox, .mc img, .q_content img";

/// 解析候选选择器，按优先级排列，命中第一个即停止
const EXPLANATION_SELECTORS: [&str; 4] = [".mark_explain", ".explanation", ".q_analysis", ".analyze"];

/// 换行的块级标签
const BLOCK_TAGS: [&str; 6] = ["br", "p", "div", "li", "tr", "h1"];

struct Selectors {
    section: Selector,
    section_label: Selector,
    question: Selector,
    prompt: Selector,
    options: Selector,
    option_item: Selector,
    correct_answer: Selector,
    user_answer: Selector,
    explanation: Vec<Selector>,
    page_title: Selector,
    base: Selector,
    img: Selector,
    image_container: Selector,
}

impl Selectors {
    fn compile() -> Result<Self, SourceError> {
        Ok(Self {
            section: compile(SECTION_SELECTOR)?,
            section_label: compile(SECTION_LABEL_SELECTOR)?,
            question: compile(QUESTION_SELECTOR)?,
            prompt: compile(PROMPT_SELECTOR)?,
            options: compile(OPTIONS_SELECTOR)?,
            option_item: compile(OPTION_ITEM_SELECTOR)?,
            correct_answer: compile(CORRECT_ANSWER_SELECTOR)?,
            user_answer: compile(USER_ANSWER_SELECTOR)?,
            explanation: EXPLANATION_SELECTORS
                .iter()
                .map(|s| compile(s))
                .collect::<Result<Vec<_>, _>>()?,
            page_title: compile(PAGE_TITLE_SELECTOR)?,
            base: compile(BASE_SELECTOR)?,
            img: compile(IMG_SELECTOR)?,
            image_container: compile(IMAGE_CONTAINER_SELECTOR)?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector, SourceError> {
    Selector::parse(selector).map_err(|_| SourceError::InvalidSelector {
        selector: selector.to_string(),
    })
}

/// 已解析的试题页面
pub struct ScrapedPage {
    document: Html,
    base_url: Option<Url>,
    selectors: Selectors,
}

impl ScrapedPage {
    /// 解析页面 HTML
    ///
    /// `page_url` 用于把相对图片地址补全为绝对地址；页面中的 `<base href>` 优先
    pub fn parse(html: &str, page_url: Option<&str>) -> Result<Self, SourceError> {
        let document = Html::parse_document(html);
        let selectors = Selectors::compile()?;

        let page_url = page_url.and_then(|u| Url::parse(u).ok());
        let base_url = document
            .select(&selectors.base)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| match &page_url {
                Some(page) => page.join(href).ok(),
                None => Url::parse(href).ok(),
            })
            .or(page_url);

        debug!("页面解析完成，基础地址: {:?}", base_url.as_ref().map(Url::as_str));

        Ok(Self {
            document,
            base_url,
            selectors,
        })
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// 与浏览器 `img.src` 一致：相对地址按页面地址补全
    fn absolutize(&self, src: &str) -> String {
        if src.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:")) {
            return src.to_string();
        }
        match &self.base_url {
            Some(base) => base
                .join(src)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| src.to_string()),
            None => src.to_string(),
        }
    }

    fn candidate(&self, img: ElementRef<'_>) -> Option<ImageCandidate> {
        let src = img.value().attr("src").map(str::trim).filter(|s| !s.is_empty())?;
        Some(ImageCandidate {
            src: self.absolutize(src),
            alt: img.value().attr("alt").map(|a| a.trim().to_string()),
            width: dimension(img.value().attr("width")),
            height: dimension(img.value().attr("height")),
        })
    }

    fn first_text(&self, scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
        scope.select(selector).next().map(inner_text)
    }
}

impl QuizDocument for ScrapedPage {
    type Node<'a> = ElementRef<'a>;

    fn list_section_nodes(&self) -> Vec<ElementRef<'_>> {
        self.document.select(&self.selectors.section).collect()
    }

    fn section_label<'a>(&'a self, section: ElementRef<'a>) -> Option<String> {
        self.first_text(section, &self.selectors.section_label)
            .filter(|label| !label.is_empty())
    }

    fn question_nodes<'a>(&'a self, section: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        section.select(&self.selectors.question).collect()
    }

    fn question_fields<'a>(&'a self, question: ElementRef<'a>) -> QuestionFields {
        let options = question.select(&self.selectors.options).next().map(|list| {
            list.select(&self.selectors.option_item)
                .map(inner_text)
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
        });

        let explanation = self
            .selectors
            .explanation
            .iter()
            .filter_map(|selector| self.first_text(question, selector))
            .find(|text| !text.is_empty());

        QuestionFields {
            text: Ok(self.first_text(question, &self.selectors.prompt)),
            options: Ok(options),
            user_answer: Ok(self.first_text(question, &self.selectors.user_answer)),
            correct_answer: Ok(self.first_text(question, &self.selectors.correct_answer)),
            explanation: Ok(explanation),
        }
    }

    fn find_images<'a>(&'a self, question: ElementRef<'a>) -> Vec<ImageCandidate> {
        // 1. 所有直接的 img 标签
        let mut images: Vec<ImageCandidate> = question
            .select(&self.selectors.img)
            .filter_map(|img| self.candidate(img))
            .collect();

        // 2. 特殊图片容器
        for container in question.select(&self.selectors.image_container) {
            let found: Vec<ImageCandidate> = if container.value().name().eq_ignore_ascii_case("img") {
                self.candidate(container).into_iter().collect()
            } else {
                container
                    .select(&self.selectors.img)
                    .filter_map(|img| self.candidate(img))
                    .collect()
            };
            for image in found {
                if !images.iter().any(|existing| existing.src == image.src) {
                    images.push(image);
                }
            }
        }

        images
    }

    fn page_title(&self) -> Option<String> {
        self.document
            .select(&self.selectors.page_title)
            .next()
            .map(inner_text)
            .filter(|title| !title.is_empty())
    }
}

/// 近似浏览器的 innerText：块级标签换行，行内空白折叠
pub fn inner_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => raw.push('\n'),
            _ => {}
        }
    }

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn dimension(value: Option<&str>) -> u32 {
    value
        .map(|v| v.trim().trim_end_matches("px"))
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round() as u32)
        .unwrap_or(0)
}
