//! 界面渲染
//!
//! 根据 UiState（phase、history、偏好来源、error）与 input_buffer 绘制：标题栏显示阶段与偏好来源，
//! 主体为对话记录（按角色着色、按宽度换行），底部为输入框与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};

use crate::core::{AgentPhase, UiState};
use crate::memory::Role;

fn phase_label(phase: AgentPhase) -> &'static str {
    match phase {
        AgentPhase::Initializing => "同步偏好中…",
        AgentPhase::Idle => "空闲",
        AgentPhase::Recommending => "生成推荐中…",
        AgentPhase::Chatting => "思考中…",
        AgentPhase::Syncing => "同步中…",
    }
}

/// 将内容按宽度换行，支持 UTF-8（按字符数，避免在 UTF-8 中间截断）
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        for ch in para.chars() {
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(ch);
        }
        lines.push(line);
    }
    lines
}

/// 绘制一帧：上方对话区（标题 + 历史 + 滚动条），下方输入区；将 (总行数, 可视高度) 写入 out 供外部 clamp 滚动
pub fn draw(
    f: &mut Frame,
    state: &UiState,
    input_buffer: &str,
    conversation_scroll: usize,
    out: &mut (usize, usize),
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(f.area());

    let conv_area = chunks[0];
    let content_width = conv_area.width.saturating_sub(2).saturating_sub(1) as usize; // 边框 + 滚动条

    let title = format!(
        " Attire │ {} │ {} ({}) ",
        phase_label(state.phase),
        state.preference_source.label(),
        state.preference_count
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let mut text_lines: Vec<Line> = Vec::new();
    if state.history.is_empty() {
        text_lines.push(Line::from(Span::styled(
            "输入 help 查看命令；recommend [city] 获取今日穿搭建议",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for (idx, m) in state.history.iter().enumerate() {
        if idx > 0 {
            text_lines.push(Line::from(Span::raw("")));
        }
        let (prefix, color) = match m.role {
            Role::User => ("You ", Color::Cyan),
            Role::Assistant => ("Bot ", Color::Green),
            Role::System => ("Sys ", Color::Gray),
        };
        for (i, line) in wrap_text(&m.content, content_width.saturating_sub(4).max(20))
            .into_iter()
            .enumerate()
        {
            let pref = if i == 0 { prefix } else { "    " };
            text_lines.push(Line::from(vec![
                Span::styled(pref, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::raw(line),
            ]));
        }
    }

    let content_height = conv_area.height.saturating_sub(2) as usize; // 边框
    let total_lines = text_lines.len();
    let max_scroll = total_lines.saturating_sub(content_height);
    let scroll_offset = conversation_scroll.min(max_scroll);

    let inner = block.inner(conv_area);
    let paragraph = Paragraph::new(Text::from(text_lines))
        .block(block)
        .scroll((scroll_offset as u16, 0));
    f.render_widget(paragraph, conv_area);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(scroll_offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
    }

    let input_prompt = if let Some(err) = &state.error_message {
        format!(" 提示: {} ", err.chars().take(48).collect::<String>())
    } else if state.input_locked {
        format!(" {} ", phase_label(state.phase))
    } else {
        " 输入 ".to_string()
    };

    let border_color = if state.error_message.is_some() {
        Color::Red
    } else {
        Color::Blue
    };

    let hint = " Enter 发送 │ ↑↓ PgUp/PgDn 滚动 │ Esc/Ctrl+C 取消 │ Ctrl+L 清屏 │ Ctrl+Q 退出 ";
    let input_block = Block::default()
        .title(input_prompt)
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let input = Paragraph::new(input_buffer)
        .block(input_block)
        .style(if state.input_locked {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        });

    f.render_widget(input, chunks[1]);

    out.0 = total_lines;
    out.1 = content_height;
}
