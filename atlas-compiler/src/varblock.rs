//! Collects every `set` step into the program's variable layout: a packed `f32` uniform
//! block for sized variables (1/2/3/4/16 floats, aligned the way GLSL/WGSL uniform blocks
//! require), plus an index space for unsized "big" variables that hold an arbitrary tensor.
//!
//! Grounded in `program.h`'s `varNames`/`varOffsets`/`varSizes`/`varBlock`/`bigvarNames`
//! fields and the variable-collection pass described in spec.md §4.5 point 4.

use std::collections::HashMap;

use crate::error::Detail;
use crate::step::VarSlot;

/// Slot alignment in `f32`s for each declared variable size, matching spec.md §4.5's "sizes
/// {1,2,3,4} occupy 2 or 4 slots each (for alignment), size 16 occupies 16".
fn slot_count(size: u32) -> u32 {
    match size {
        1 | 2 => 2,
        3 | 4 => 4,
        16 => 16,
        _ => unreachable!("size already validated to {{1,2,3,4,16}}"),
    }
}

fn wgsl_type(size: u32) -> &'static str {
    match size {
        1 => "f32",
        2 => "vec2<f32>",
        3 => "vec3<f32>",
        4 => "vec4<f32>",
        16 => "mat4x4<f32>",
        _ => unreachable!("size already validated to {{1,2,3,4,16}}"),
    }
}

/// A sized variable's position in the uniform block.
#[derive(Debug, Clone, Copy)]
pub struct SizedVar {
    pub offset: u32,
    pub size: u32,
}

#[derive(Default)]
pub struct VarBlock {
    sized: HashMap<String, SizedVar>,
    /// Declaration order, needed to emit a deterministic WGSL struct.
    sized_order: Vec<String>,
    big: HashMap<String, u32>,
    big_order: Vec<String>,
    next_offset: u32,
}

impl VarBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name` with `size` (0 means a big/unsized variable). Repeated declarations
    /// of the same name must agree on size; this is stricter than strictly necessary but
    /// catches a program declaring the same variable two different widths, which the
    /// original's trie-overwrite-on-insert would otherwise silently rescope.
    pub fn declare(&mut self, name: &str, size: u32) -> Result<(), Detail> {
        if size == 0 {
            if let Some(&existing) = self.big.get(name) {
                let _ = existing;
                return Ok(());
            }
            let index = self.big_order.len() as u32;
            self.big.insert(name.to_string(), index);
            self.big_order.push(name.to_string());
            return Ok(());
        }
        if let Some(existing) = self.sized.get(name) {
            if existing.size != size {
                return Err(Detail::MalformedSet);
            }
            return Ok(());
        }
        let stride = slot_count(size);
        let offset = self.next_offset.div_ceil(stride) * stride;
        self.sized.insert(name.to_string(), SizedVar { offset, size });
        self.sized_order.push(name.to_string());
        self.next_offset = offset + stride;
        Ok(())
    }

    pub fn slot(&self, name: &str) -> Option<VarSlot> {
        if let Some(sized) = self.sized.get(name) {
            return Some(VarSlot::Sized { offset: sized.offset, size: sized.size });
        }
        self.big.get(name).map(|&index| VarSlot::Big { index })
    }

    pub fn total_floats(&self) -> u32 {
        self.next_offset
    }

    pub fn bigvar_names(&self) -> &[String] {
        &self.big_order
    }

    /// Builds the WGSL `@group(0) @binding(0) var<uniform>` declaration `atlas_compute`'s
    /// synthesizer expects as its `uniforms` text, one field per sized variable in
    /// declaration order. Dots in workspace-qualified names aren't valid WGSL identifier
    /// characters, so they're flattened to underscores here only (lookups elsewhere still
    /// use the dotted name).
    pub fn uniform_declaration(&self) -> String {
        let mut fields = String::new();
        for name in &self.sized_order {
            let var = self.sized[name];
            fields.push_str(&format!("    {}: {},\n", wgsl_ident(name), wgsl_type(var.size)));
        }
        format!(
            "struct ProgramVariables {{\n{fields}}}\n@group(0) @binding(0) var<uniform> variables: ProgramVariables;\n"
        )
    }
}

fn wgsl_ident(name: &str) -> String {
    name.replace('.', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn aligns_consecutive_sized_vars() {
        let mut vb = VarBlock::new();
        vb.declare("a", 1).unwrap();
        vb.declare("b", 3).unwrap();
        assert_eq!(vb.slot("a"), Some(VarSlot::Sized { offset: 0, size: 1 }));
        assert_eq!(vb.slot("b"), Some(VarSlot::Sized { offset: 2, size: 3 }));
        assert_eq!(vb.total_floats(), 6);
    }

    #[test]
    fn big_vars_get_sequential_indices() {
        let mut vb = VarBlock::new();
        vb.declare("x", 0).unwrap();
        vb.declare("y", 0).unwrap();
        assert_eq!(vb.slot("x"), Some(VarSlot::Big { index: 0 }));
        assert_eq!(vb.slot("y"), Some(VarSlot::Big { index: 1 }));
    }

    #[test]
    fn conflicting_redeclaration_errors() {
        let mut vb = VarBlock::new();
        vb.declare("a", 1).unwrap();
        assert!(vb.declare("a", 4).is_err());
    }

    #[test]
    fn emits_wgsl_struct_in_declaration_order() {
        let mut vb = VarBlock::new();
        vb.declare("foo.bar", 4).unwrap();
        let decl = vb.uniform_declaration();
        assert!(decl.contains("foo_bar: vec4<f32>"));
    }
}
