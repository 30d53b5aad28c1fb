//! Agent 回答与追踪的 Markdown 渲染
//!
//! 回答片段在被引用文本之后插入 `[^n]` 脚注标记，并在片段末尾追加脚注定义；
//! 编排追踪按思考过程、工具调用输入、工具调用结果的优先级渲染为一段文本。

use crate::stream::events::{page_number_text, Citation, PAGE_NUMBER_METADATA};
use serde::Deserialize;
use serde_json::Value;

/// 搜索类 Action Group 的名称
pub const SEARCH_ACTION_GROUP: &str = "Search";
/// 工具输出的最大展示字符数
pub const MAX_OUTPUT_CHARS: usize = 1000;

const SEARCH_RESULTS_OPEN: &str = "<search_results>";
const SEARCH_RESULTS_CLOSE: &str = "</search_results>";

/// 搜索结果条目
#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
}

/// `s3://bucket/key` → `https://s3.{region}.amazonaws.com/bucket/key`，无法识别时返回空串
pub fn s3_uri_to_url(uri: &str, region: &str) -> String {
    let Some((bucket, key)) = uri
        .strip_prefix("s3://")
        .and_then(|rest| rest.split_once('/'))
    else {
        return String::new();
    };
    if bucket.is_empty() || key.is_empty() {
        return String::new();
    }
    format!("https://s3.{}.amazonaws.com/{}/{}", region, bucket, key)
}

/// 与浏览器 `encodeURIComponent` 一致：`!'()*` 不编码
fn encode_uri_component(s: &str) -> String {
    urlencoding::encode(s)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

/// `[文件名(p.N)](url#page=N)`，链接中的文件名做 URL 编码
fn reference_link(url: &str, page: Option<&str>) -> String {
    let file_name = url.rsplit('/').next().unwrap_or_default();
    let href = url.replacen(file_name, &encode_uri_component(file_name), 1);
    match page {
        Some(page) => format!("[{}(p.{})]({}#page={})", file_name, page, href, page),
        None => format!("[{}]({})", file_name, href),
    }
}

/// 第 `chars` 个字符的字节位置，越界时取末尾
fn byte_index(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

/// 渲染回答片段
///
/// 同一文档只生成一条脚注定义，编号从 0 开始。
pub fn render_chunk(text: &str, citations: &[Citation], region: &str) -> String {
    let mut body = text.to_string();
    let mut sources: Vec<String> = Vec::new();
    let mut offset = 0;

    for citation in citations {
        for reference in &citation.references {
            let Some(uri) = reference.uri.as_deref().filter(|u| !u.is_empty()) else {
                continue;
            };
            let url = s3_uri_to_url(uri, region);

            let id = match sources.iter().position(|s| *s == url) {
                Some(id) => id,
                None => {
                    let id = sources.len();
                    body.push_str(&format!(
                        "\n[^{}]: {}",
                        id,
                        reference_link(&url, reference.page_number.as_deref())
                    ));
                    sources.push(url);
                    id
                }
            };

            let marker = format!("[^{}]", id);
            let position = citation.span_end.unwrap_or(0) + offset + 1;
            offset += marker.chars().count();
            let at = byte_index(&body, position);
            body.insert_str(at, &marker);
        }
    }
    body
}

fn text_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

/// 渲染编排追踪，没有可展示内容时返回空串
pub fn render_trace(orchestration: &Value, region: &str) -> String {
    if let Some(rationale) = text_at(orchestration, "/rationale/text") {
        return rationale.to_string();
    }
    if let Some(input) = orchestration.get("invocationInput") {
        return invocation_input_text(input);
    }
    if let Some(observation) = orchestration.get("observation") {
        return observation_text(observation, region);
    }
    String::new()
}

fn invocation_input_text(input: &Value) -> String {
    if let Some(code) = text_at(input, "/codeInterpreterInvocationInput/code") {
        return format!("```python{}\n```", code);
    }
    if let Some(name) = text_at(input, "/actionGroupInvocationInput/actionGroupName") {
        if name != SEARCH_ACTION_GROUP {
            return name.to_string();
        }
        let keywords: Vec<&str> = input
            .pointer("/actionGroupInvocationInput/requestBody/content/application~1json")
            .and_then(|v| v.as_array())
            .map(|params| {
                params
                    .iter()
                    .filter_map(|p| p.get("value").and_then(|v| v.as_str()))
                    .collect()
            })
            .unwrap_or_default();
        return format!("{}: {}", name, keywords.join(" "));
    }
    if let Some(text) = text_at(input, "/knowledgeBaseLookupInput/text") {
        return format!("Search: {}", text);
    }
    String::new()
}

fn observation_text(observation: &Value, region: &str) -> String {
    if let Some(output) = text_at(observation, "/codeInterpreterInvocationOutput/executionOutput")
    {
        return output.to_string();
    }
    if let Some(output) = text_at(observation, "/actionGroupInvocationOutput/text") {
        return action_output_text(output);
    }
    if let Some(references) = observation
        .pointer("/knowledgeBaseLookupOutput/retrievedReferences")
        .and_then(|v| v.as_array())
    {
        let mut lines: Vec<String> = Vec::new();
        for reference in references {
            if let Some(line) = reference_line(reference, region) {
                if !lines.contains(&line) {
                    lines.push(line);
                }
            }
        }
        return lines.join("\n");
    }
    String::new()
}

/// 搜索结果渲染为链接列表，其他输出截断展示
fn action_output_text(output: &str) -> String {
    if let Some(rest) = output.strip_prefix(SEARCH_RESULTS_OPEN) {
        let json = rest.replacen(SEARCH_RESULTS_CLOSE, "", 1);
        match serde_json::from_str::<Vec<SearchResult>>(&json) {
            Ok(results) => {
                return results
                    .iter()
                    .map(|r| format!("- [{}]({})", r.title, r.url))
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            Err(e) => tracing::debug!("[AGENT] 搜索结果不是合法 JSON: {}", e),
        }
    }

    if output.chars().count() > MAX_OUTPUT_CHARS {
        let head: String = output.chars().take(MAX_OUTPUT_CHARS).collect();
        format!("{}...", head)
    } else {
        output.to_string()
    }
}

/// 知识库检索结果的一行：取第一个带 `uri` 或 `url` 的位置
fn reference_line(reference: &Value, region: &str) -> Option<String> {
    let location = reference
        .get("location")?
        .as_object()?
        .values()
        .find(|loc| text_at(loc, "/uri").is_some() || text_at(loc, "/url").is_some())?;

    let url = match text_at(location, "/uri") {
        Some(uri) => s3_uri_to_url(uri, region),
        None => text_at(location, "/url").unwrap_or_default().to_string(),
    };
    let page = reference
        .get("metadata")
        .and_then(|m| m.get(PAGE_NUMBER_METADATA))
        .and_then(page_number_text);
    Some(format!("- {}", reference_link(&url, page.as_deref())))
}
