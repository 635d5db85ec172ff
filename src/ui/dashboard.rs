use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Gauge, List, ListItem, Paragraph},
};

use crate::{
    devices::{DeviceState, Devices},
    gesture::{Classification, FingerState, progressive::Levels},
    protocol::Command,
};

use super::EventLog;

/// Everything the gesture dashboard shows for one frame.
pub struct DashboardView<'a> {
    pub link: &'a str,
    pub connected: bool,
    pub finger_state: Option<FingerState>,
    pub classification: Classification,
    pub command: Option<Command>,
    pub levels: Levels,
    pub devices: &'a Devices,
    pub events: &'a EventLog,
}

const HELP: &str = "1 Luces ON  2 Luces OFF  3 Vent. ON  4 Vent. OFF  5 Alarma  \
                    6 Abrir  7 Cerrar  0 Todo OFF  r Reversa  q/Esc Salir";

const DEVICE_HEIGHT: u16 = 3;

pub fn render(frame: &mut Frame, view: &DashboardView) {
    let devices_height = DEVICE_HEIGHT * view.devices.iter().count() as u16 + 2;

    let [header, devices, events, help] = Layout::vertical([
        Constraint::Length(6),
        Constraint::Length(devices_height),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    render_header(frame, header, view);
    render_devices(frame, devices, view.devices);
    render_events(frame, events, view.events);

    frame.render_widget(Paragraph::new(HELP).dark_gray(), help);
}

fn render_header(frame: &mut Frame, area: Rect, view: &DashboardView) {
    let colour = Color::from(view.classification.colour);

    let pattern = view
        .finger_state
        .map_or_else(|| "-----".to_owned(), |s| s.to_string());

    let command = view
        .command
        .map_or_else(|| "Ninguno".to_owned(), |c| c.to_string());

    let link = if view.connected {
        Span::styled(view.link, Style::new().green())
    } else {
        Span::styled(format!("{} (desconectado)", view.link), Style::new().red())
    };

    let lines = vec![
        Line::from(vec![
            "Dedos: ".into(),
            Span::styled(pattern, Style::new().fg(colour).bold()),
        ]),
        Line::from(Span::styled(view.classification.description, Style::new().fg(colour))),
        Line::from(vec!["Comando: ".into(), Span::raw(command).bold()]),
        Line::from(format!(
            "Ángulo puerta: {}°  Velocidad ventilador: {}/{}",
            view.levels.servo_angle,
            view.levels.fan_speed,
            Command::MAX_FAN_SPEED
        )),
    ];

    let block = Block::bordered().title(Line::from(vec![" Gestos ".bold(), link, " ".into()]));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_devices(frame: &mut Frame, area: Rect, devices: &Devices) {
    let block = Block::bordered().title(" Dispositivos ".bold());
    let inner = block.inner(area);

    frame.render_widget(block, area);

    let rows = Layout::vertical(devices.iter().map(|_| Constraint::Length(DEVICE_HEIGHT)))
        .split(inner);

    for (device, row) in devices.iter().zip(rows.iter()) {
        render_device(frame, *row, device);
    }
}

fn render_device(frame: &mut Frame, area: Rect, device: &DeviceState) {
    let colour = Color::from(device.colour);
    let title = format!(" {} {} ", device.kind.icon(), device.kind);
    let block = Block::bordered().title(title);

    match device.ratio() {
        Some(ratio) => {
            let gauge = Gauge::default()
                .block(block)
                .gauge_style(Style::new().fg(colour))
                .ratio(ratio.clamp(0., 1.))
                .label(device.state.as_str());

            frame.render_widget(gauge, area);
        }

        None => {
            let state = Paragraph::new(Span::styled(device.state.as_str(), Style::new().fg(colour).bold()))
                .block(block);

            frame.render_widget(state, area);
        }
    }
}

fn render_events(frame: &mut Frame, area: Rect, events: &EventLog) {
    // Newest events at the top, trimmed to what fits
    let visible = area.height.saturating_sub(2) as usize;

    let items: Vec<ListItem> = events
        .iter()
        .rev()
        .take(visible)
        .map(|event| {
            let colour = Color::from(event.annotation.colour());
            ListItem::new(Span::styled(event.to_string(), Style::new().fg(colour)))
        })
        .collect();

    let list = List::new(items).block(Block::bordered().title(" Eventos ".bold()));

    frame.render_widget(list, area);
}

#[cfg(test)]
mod tests {
    use ratatui::{Terminal, backend::TestBackend};

    use crate::ui::Annotation;

    use super::*;

    fn screen(view: &DashboardView) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|frame| render(frame, view)).unwrap();

        let buffer = terminal.backend().buffer();
        buffer.content.iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn test_render_dashboard() {
        let devices = Devices::new();
        let mut events = EventLog::default();
        events.push(Annotation::Sent, "FAN_ON");

        let view = DashboardView {
            link: "/dev/ttyACM0",
            connected: false,
            finger_state: None,
            classification: Classification::UNRECOGNISED,
            command: None,
            levels: Levels {
                servo_angle: 90,
                fan_speed: 0,
            },
            devices: &devices,
            events: &events,
        };

        let screen = screen(&view);

        assert!(screen.contains("-----"));
        assert!(screen.contains("Gesto no reconocido"));
        assert!(screen.contains("Ninguno"));
        assert!(screen.contains("desconectado"));
        assert!(screen.contains("[SENT] FAN_ON"));
        assert!(screen.contains("Puerta"));
    }
}
