//! UI rendering for the debugger.

use super::app::DebuggerApp;
use crate::cpu::memory::MEMORY_SIZE;
use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(frame.area());

    // Left side: code and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(11),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: memory and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(6)])
        .split(chunks[1]);

    draw_memory(frame, right_chunks[0], app);
    draw_help(frame, right_chunks[1]);
}

/// Draw disassembly view centered on the program counter.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:04X}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(list, area);
}

/// Draw the register file, two registers per row.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let pc_reg = app.cpu.config().pc_reg;
    let sp_reg = app.cpu.config().sp_reg;

    let mut content: Vec<Line> = (0..8u8)
        .map(|row| {
            let mut spans = Vec::new();
            for reg in [row, row + 8] {
                let value = app.cpu.regs.read(reg);
                let style = if reg == pc_reg {
                    Style::default().fg(Color::Yellow)
                } else if reg == sp_reg {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default().fg(Color::White)
                };
                spans.push(Span::raw(format!("r{:<2} ", reg)));
                spans.push(Span::styled(format!("{:04X}", value), style));
                spans.push(Span::raw(format!(" {:>5}   ", value)));
            }
            Line::from(spans)
        })
        .collect();

    content.push(Line::from(vec![
        Span::raw("Cycles: "),
        Span::styled(format!("{}", app.cpu.cycles), Style::default().fg(Color::Cyan)),
        Span::raw("   State: "),
        Span::styled(
            format!("{:?}", app.cpu.state),
            if app.cpu.is_running() {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Red)
            },
        ),
    ]));

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)),
    );

    frame.render_widget(paragraph, area);
}

/// Draw memory view.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let start = app.mem_scroll;
    let end = (start + visible_rows).min(MEMORY_SIZE);
    let pc = usize::from(app.cpu.pc());

    let items: Vec<ListItem> = (start..end)
        .map(|addr| {
            let value = app.cpu.mem.read(addr);
            let is_pc = addr == pc;

            let text = format!("{:04X}: {:016b} = {}", addr, value, value);

            let style = if is_pc {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if value != 0 {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)),
    );

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default().title(" Status ").borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint"),
        Line::from("x: Reset  ↑↓ PgUp PgDn: Scroll memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default().title(" Help ").borders(Borders::ALL));

    frame.render_widget(help, area);
}
