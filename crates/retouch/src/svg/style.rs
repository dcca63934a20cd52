use super::{NodeId, SvgDocument};

fn parse_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let k = k.trim();
            let v = v.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

fn write_declarations(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(k, v)| format!("{k}: {v};"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl SvgDocument {
    /// Reads one property from the inline `style` attribute.
    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.attr(id, "style")?;
        parse_declarations(style)
            .into_iter()
            .rev()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v)
    }

    /// Sets one inline style property, keeping the position of an existing declaration.
    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        let mut decls = self
            .attr(id, "style")
            .map(parse_declarations)
            .unwrap_or_default();
        match decls.iter_mut().find(|(k, _)| k == property) {
            Some(slot) => slot.1 = value.to_string(),
            None => decls.push((property.to_string(), value.to_string())),
        }
        self.set_attr(id, "style", write_declarations(&decls));
    }

    pub fn remove_style(&mut self, id: NodeId, property: &str) {
        let Some(style) = self.attr(id, "style") else {
            return;
        };
        let mut decls = parse_declarations(style);
        let before = decls.len();
        decls.retain(|(k, _)| k != property);
        if decls.len() == before {
            return;
        }
        if decls.is_empty() {
            self.remove_attr(id, "style");
        } else {
            self.set_attr(id, "style", write_declarations(&decls));
        }
    }

    /// Presentation value with inline style taking precedence over the attribute.
    pub fn presentation(&self, id: NodeId, property: &str) -> Option<String> {
        self.style(id, property)
            .or_else(|| self.attr(id, property).map(str::to_string))
    }
}
