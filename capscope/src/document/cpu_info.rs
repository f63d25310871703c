//! CPU topology from an embedded `/proc/cpuinfo`.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuInfo {
    pub id: u32,
    pub core_id: u32,
    pub model_name: Option<String>,
}

const PROCESSOR: &str = "processor\t: ";
const CORE_ID: &str = "core id\t\t: ";
const MODEL_NAME: &str = "model name\t: ";
/// Some architectures name the model once for the whole machine.
const MODEL: &str = "Model\t\t: ";

/// Parse `/proc/cpuinfo` contents into one entry per processor.
#[must_use]
pub fn parse_cpuinfo(contents: &str) -> Vec<CpuInfo> {
    let mut cpus = Vec::new();
    let mut current: Option<CpuInfo> = None;
    let mut machine_model: Option<&str> = None;

    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix(PROCESSOR) {
            cpus.extend(current.take());
            current = Some(CpuInfo { id: parse_leading_int(rest), ..CpuInfo::default() });
        } else if let Some(rest) = line.strip_prefix(CORE_ID) {
            let core_id = parse_leading_int(rest);
            if let Some(cpu) = current.as_mut().filter(|_| core_id > 0) {
                cpu.core_id = core_id;
            }
        } else if let Some(rest) = line.strip_prefix(MODEL_NAME) {
            if let Some(cpu) = current.as_mut() {
                cpu.model_name = Some(rest.to_string());
            }
        } else if let Some(rest) = line.strip_prefix(MODEL) {
            machine_model.get_or_insert(rest);
        }
    }
    cpus.extend(current);

    if let Some(model) = machine_model {
        for cpu in &mut cpus {
            cpu.model_name = Some(model.to_string());
        }
    }
    cpus
}

fn parse_leading_int(s: &str) -> u32 {
    let digits = s.trim_start();
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse().unwrap_or_default()
}
