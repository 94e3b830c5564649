//! The statement reorderer/desugarer (spec.md §4.4): one conceptual walk
//! that performs seven canonicalizing rewrites, in order, over the whole
//! program. Runs after name resolution and type inference so the later
//! steps can consult `ast.resolved`/`ast.types` (spec.md §2 data flow).

use crate::ast::expr::{BinaryExpr, IdentRef};
use crate::ast::stmt::Assignment;
use crate::ast::types::DataType;
use crate::ast::{decl, Ast, NodeId, NodeKind};
use crate::error::{CompileError, Diagnostics};
use crate::util::Span;

pub struct Reorderer {
    diagnostics: Diagnostics<CompileError>,
}

impl Reorderer {
    pub fn new(source: &str) -> Self {
        Self {
            diagnostics: Diagnostics::new(source.to_string()),
        }
    }

    pub fn run(mut self, ast: &mut Ast, root: NodeId) -> Diagnostics<CompileError> {
        for module in ast.children_of(root).to_vec() {
            self.reorder_top_level(ast, module);
        }
        self.hoist_scope(ast, root);
        self.promote_start_everywhere(ast, root);
        self.split_non_constant_initializers(ast, root);
        self.desugar_augmented_assignments(ast, root);
        self.desugar_struct_assignments(ast, root);
        self.sort_when_choices(ast, root);
        self.diagnostics
    }

    /// Step 1: partition a module's top-level statements into blocks and
    /// non-blocks, sort blocks by address (no address sorts last), move
    /// `main` to the front unless it has an explicit address, and move
    /// library blocks to the very end.
    fn reorder_top_level(&mut self, ast: &mut Ast, module: NodeId) {
        let children = ast.children_of(module).to_vec();
        let (blocks, non_blocks): (Vec<NodeId>, Vec<NodeId>) = children
            .iter()
            .copied()
            .partition(|&c| matches!(ast.kind(c), NodeKind::Block(_)));

        let (mut library_blocks, mut normal_blocks): (Vec<NodeId>, Vec<NodeId>) = blocks
            .iter()
            .copied()
            .partition(|&b| matches!(ast.kind(b), NodeKind::Block(b) if b.is_library()));

        normal_blocks.sort_by_key(|&b| block_address(ast, b).unwrap_or(u32::MAX));

        if let Some(main_pos) = normal_blocks
            .iter()
            .position(|&b| matches!(ast.kind(b), NodeKind::Block(blk) if blk.name == "main"))
        {
            if block_address(ast, normal_blocks[main_pos]).is_none() {
                let main = normal_blocks.remove(main_pos);
                normal_blocks.insert(0, main);
            }
        }

        let mut new_order = non_blocks;
        new_order.append(&mut normal_blocks);
        new_order.append(&mut library_blocks);

        for &c in &children {
            ast.remove(module, c);
        }
        for &c in &new_order {
            ast.insert_last(module, c);
        }
    }

    /// Step 2: within every scope, hoist variable declarations to the top,
    /// then hoist the fixed set of directives above them.
    fn hoist_scope(&mut self, ast: &mut Ast, id: NodeId) {
        if ast.kind(id).is_scope() || matches!(ast.kind(id), NodeKind::Program(_)) {
            let children = ast.children_of(id).to_vec();
            let (directives, rest): (Vec<NodeId>, Vec<NodeId>) = children
                .iter()
                .copied()
                .partition(|&c| is_hoisted_directive(ast, c));
            let (var_decls, rest): (Vec<NodeId>, Vec<NodeId>) = rest
                .iter()
                .copied()
                .partition(|&c| matches!(ast.kind(c), NodeKind::VarDecl(_)));

            let mut new_order = directives;
            new_order.extend(var_decls);
            new_order.extend(rest);

            for &c in &children {
                ast.remove(id, c);
            }
            for &c in &new_order {
                ast.insert_last(id, c);
            }
        }
        for child in ast.children_of(id).to_vec() {
            self.hoist_scope(ast, child);
        }
    }

    /// Step 3: promote the `start` subroutine to be the first subroutine of
    /// its enclosing block.
    fn promote_start_everywhere(&mut self, ast: &mut Ast, id: NodeId) {
        if matches!(ast.kind(id), NodeKind::Block(_)) {
            let children = ast.children_of(id).to_vec();
            let subs: Vec<NodeId> = children
                .iter()
                .copied()
                .filter(|&c| matches!(ast.kind(c), NodeKind::Subroutine(_)))
                .collect();
            if let (Some(&first_sub), Some(start)) = (
                subs.first(),
                subs.iter()
                    .copied()
                    .find(|&s| matches!(ast.kind(s), NodeKind::Subroutine(sub) if sub.is_start())),
            ) {
                if first_sub != start {
                    ast.remove(id, start);
                    ast.insert_before(id, first_sub, start);
                }
            }
        }
        for child in ast.children_of(id).to_vec() {
            self.promote_start_everywhere(ast, child);
        }
    }

    /// Step 4: `var x: T = e` where `e` is not a compile-time constant
    /// becomes a bare declaration plus an assignment `x = e` right after it.
    fn split_non_constant_initializers(&mut self, ast: &mut Ast, id: NodeId) {
        if let NodeKind::VarDecl(v) = ast.kind(id).clone() {
            if !v.is_const {
                if let Some(&init) = ast.children_of(id).first() {
                    if !is_compile_time_constant(ast, init) {
                        let parent = ast.parent_of(id).expect("VarDecl always has a parent");
                        let span = ast.span(init);
                        ast.remove(id, init);

                        let assignment =
                            ast.alloc_detached_node(NodeKind::Assignment(Assignment { aug_op: None }), span);
                        let target = ast.alloc_detached_node(
                            NodeKind::IdentRef(IdentRef {
                                path: vec![v.name.clone()],
                            }),
                            span,
                        );
                        ast.resolved.insert(target, id);
                        ast.types.insert(target, v.data_type.clone());
                        ast.append_child(assignment, target);
                        ast.append_child(assignment, init);

                        ast.insert_after(parent, id, assignment);
                    }
                }
            }
        }
        for child in ast.children_of(id).to_vec() {
            self.split_non_constant_initializers(ast, child);
        }
    }

    /// Step 5: `x op= e` becomes `x = x op e`.
    fn desugar_augmented_assignments(&mut self, ast: &mut Ast, id: NodeId) {
        if let NodeKind::Assignment(a) = ast.kind(id).clone() {
            if let Some(op) = a.aug_op {
                let children = ast.children_of(id).to_vec();
                let (target, rhs) = (children[0], children[1]);
                let target_clone = ast.deep_clone(target);
                let span = ast.span(rhs);

                ast.remove(id, rhs);
                let bin = ast.alloc(NodeKind::BinaryExpr(BinaryExpr { op }), span, id);
                ast.append_child(bin, target_clone);
                ast.append_child(bin, rhs);
                if let Some(ty) = ast.types.get(&target).cloned() {
                    ast.types.insert(bin, ty);
                }
                if let NodeKind::Assignment(ref mut a) = ast.node_mut(id).kind {
                    a.aug_op = None;
                }
            }
        }
        for child in ast.children_of(id).to_vec() {
            self.desugar_augmented_assignments(ast, child);
        }
    }

    /// Step 6: a struct-typed assignment expands into memberwise
    /// assignments on flattened names, either against another struct value
    /// or against a struct literal in declared member order.
    fn desugar_struct_assignments(&mut self, ast: &mut Ast, id: NodeId) {
        if let NodeKind::Assignment(a) = ast.kind(id).clone() {
            if a.aug_op.is_none() {
                self.try_desugar_one_struct_assignment(ast, id);
            }
        }
        for child in ast.children_of(id).to_vec() {
            self.desugar_struct_assignments(ast, child);
        }
    }

    fn try_desugar_one_struct_assignment(&mut self, ast: &mut Ast, assignment: NodeId) {
        let children = ast.children_of(assignment).to_vec();
        let (target, value) = (children[0], children[1]);
        let struct_decl = match ast.type_of(target).clone() {
            DataType::Struct {
                resolved: Some(sd), ..
            } => sd,
            _ => return,
        };
        let members: Vec<(String, DataType)> = ast
            .children_of(struct_decl)
            .iter()
            .filter_map(|&m| match ast.kind(m) {
                NodeKind::VarDecl(v) => Some((v.name.clone(), v.data_type.clone())),
                _ => None,
            })
            .collect();

        let value_is_literal = matches!(ast.kind(value), NodeKind::ArrayLit(_));
        let value_elems = if value_is_literal {
            let elems = ast.children_of(value).to_vec();
            if elems.len() != members.len() {
                self.diagnostics.push(
                    CompileError::StructElementCountMismatch {
                        expected: members.len(),
                        actual: elems.len(),
                    },
                    ast.span(value),
                );
                return;
            }
            Some(elems)
        } else {
            None
        };

        let parent = ast.parent_of(assignment).expect("assignment always has a parent");
        let span = ast.span(assignment);
        let target_base = scoped_base_name(ast, target);
        let value_base = scoped_base_name(ast, value);

        ast.remove(parent, assignment);

        let mut anchor = None;
        for (i, (member_name, member_ty)) in members.iter().enumerate() {
            let member_assignment =
                ast.alloc_detached_node(NodeKind::Assignment(Assignment { aug_op: None }), span);
            let target_member = flattened_ident(ast, &target_base, member_name, member_ty, span);
            ast.append_child(member_assignment, target_member);

            let value_member = if let Some(elems) = &value_elems {
                let e = elems[i];
                ast.remove(value, e);
                e
            } else {
                flattened_ident(ast, &value_base, member_name, member_ty, span)
            };
            ast.append_child(member_assignment, value_member);

            match anchor {
                None => ast.insert_first(parent, member_assignment),
                Some(prev) => ast.insert_after(parent, prev, member_assignment),
            }
            anchor = Some(member_assignment);
        }
    }

    /// Step 7: order `when` arms by their smallest constant value; the
    /// default `else` arm sorts last.
    fn sort_when_choices(&mut self, ast: &mut Ast, id: NodeId) {
        if let NodeKind::When(w) = ast.kind(id).clone() {
            let children = ast.children_of(id).to_vec();
            let subject = children[0];
            let mut bodies = Vec::with_capacity(w.arms.len());
            let mut offset = 1;
            for arm in &w.arms {
                bodies.push(children[offset..offset + arm.body_len].to_vec());
                offset += arm.body_len;
            }

            let mut indices: Vec<usize> = (0..w.arms.len()).collect();
            indices.sort_by_key(|&i| {
                let arm = &w.arms[i];
                if arm.is_default {
                    (1, i64::MAX)
                } else {
                    let min = arm.values.iter().map(numeric_key).min().unwrap_or(i64::MAX);
                    (0, min)
                }
            });

            let new_arms: Vec<_> = indices.iter().map(|&i| w.arms[i].clone()).collect();
            let mut new_children = vec![subject];
            for &i in &indices {
                new_children.extend(bodies[i].iter().copied());
            }

            for &c in &children {
                ast.remove(id, c);
            }
            for &c in &new_children {
                ast.insert_last(id, c);
            }
            if let NodeKind::When(ref mut w) = ast.node_mut(id).kind {
                w.arms = new_arms;
            }
        }
        for child in ast.children_of(id).to_vec() {
            self.sort_when_choices(ast, child);
        }
    }
}

fn block_address(ast: &Ast, block: NodeId) -> Option<u32> {
    match ast.kind(block) {
        NodeKind::Block(b) => b.address,
        _ => None,
    }
}

fn is_hoisted_directive(ast: &Ast, id: NodeId) -> bool {
    matches!(ast.kind(id), NodeKind::Directive(d) if decl::Directive::HOISTED_NAMES.contains(&d.name.as_str()))
}

/// A conservative notion of "compile-time constant" for step 4: literals and
/// literal arrays. The constant folder (spec.md §4.5) is what actually
/// proves more complex expressions constant; this only needs to recognize
/// the cases that never need splitting in the first place.
fn is_compile_time_constant(ast: &Ast, id: NodeId) -> bool {
    match ast.kind(id) {
        NodeKind::NumberLit(_) | NodeKind::StringLit(_) => true,
        NodeKind::ArrayLit(_) => ast
            .children_of(id)
            .iter()
            .all(|&c| is_compile_time_constant(ast, c)),
        _ => false,
    }
}

/// The dotted scoped name of the declaration an `IdentRef` resolves to, e.g.
/// `m.p1` rather than whatever bare path the source wrote (`p1`). Member
/// flattening needs the module-qualified form so `p1$x` can't collide with
/// a same-named local in another module.
fn scoped_base_name(ast: &Ast, expr: NodeId) -> String {
    match ast.kind(expr) {
        NodeKind::IdentRef(_) => ast.scoped_name(ast.resolved_target(expr)).to_string(),
        _ => String::new(),
    }
}

/// A flattened member reference (`p1$x`) is synthesized well after name
/// resolution has already run, so it can never go through `resolve_one`.
/// Instead it resolves to itself: `ast.resolved`/`ast.scoped_names` are both
/// keyed by `NodeId`, not tied to an actual declaration node, so an `IdentRef`
/// can stand in as its own "declaration" and carry its own flattened label.
fn flattened_ident(ast: &mut Ast, base: &str, member: &str, ty: &DataType, span: Span) -> NodeId {
    let id = ast.alloc_detached_node(
        NodeKind::IdentRef(IdentRef {
            path: vec![format!("{}${}", base, member)],
        }),
        span,
    );
    ast.types.insert(id, ty.clone());
    ast.resolved.insert(id, id);
    ast.scoped_names.insert(id, format!("{}${}", base, member));
    id
}

fn numeric_key(v: &crate::ast::expr::NumericValue) -> i64 {
    match v {
        crate::ast::expr::NumericValue::Int(n) => *n,
        crate::ast::expr::NumericValue::Float(f) => *f as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::decl::{Module, Param, StructDecl, VarDecl};
    use crate::ast::expr::IdentRef;
    use crate::ast::types::ZeropageWish;

    /// `p1 = p2` on a struct-typed pair (spec.md §8 scenario S6) expands into
    /// one plain assignment per member, on flattened `base$member` names, and
    /// the struct-typed assignment itself is gone.
    #[test]
    fn struct_assignment_expands_into_flattened_member_assignments() {
        let (mut ast, root) = Ast::new();
        let module = ast.alloc(
            NodeKind::Module(Module {
                name: "m".into(),
                is_library: true,
                imports: vec![],
            }),
            Span::SYNTHETIC,
            root,
        );
        let struct_decl = ast.alloc(
            NodeKind::StructDecl(StructDecl {
                name: "Point".into(),
                members: vec![
                    Param { name: "x".into(), data_type: DataType::Ubyte },
                    Param { name: "y".into(), data_type: DataType::Ubyte },
                ],
            }),
            Span::SYNTHETIC,
            module,
        );
        ast.alloc(
            NodeKind::VarDecl(VarDecl {
                name: "x".into(),
                data_type: DataType::Ubyte,
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            struct_decl,
        );
        ast.alloc(
            NodeKind::VarDecl(VarDecl {
                name: "y".into(),
                data_type: DataType::Ubyte,
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            struct_decl,
        );

        let point_ty = DataType::Struct {
            name: "Point".into(),
            resolved: Some(struct_decl),
        };
        let p1 = ast.alloc(
            NodeKind::VarDecl(VarDecl {
                name: "p1".into(),
                data_type: point_ty.clone(),
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            module,
        );
        let p2 = ast.alloc(
            NodeKind::VarDecl(VarDecl {
                name: "p2".into(),
                data_type: point_ty.clone(),
                zeropage: ZeropageWish::DontCare,
                is_const: false,
            }),
            Span::SYNTHETIC,
            module,
        );

        let assignment = ast.alloc(NodeKind::Assignment(Assignment { aug_op: None }), Span::SYNTHETIC, module);
        let target = ast.alloc(
            NodeKind::IdentRef(IdentRef { path: vec!["p1".into()] }),
            Span::SYNTHETIC,
            assignment,
        );
        ast.resolved.insert(target, p1);
        ast.types.insert(target, point_ty.clone());
        let value = ast.alloc(
            NodeKind::IdentRef(IdentRef { path: vec!["p2".into()] }),
            Span::SYNTHETIC,
            assignment,
        );
        ast.resolved.insert(value, p2);
        ast.types.insert(value, point_ty);

        Reorderer::new("").run(&mut ast, root);

        assert!(!ast.children_of(module).contains(&assignment));
        let assignments: Vec<NodeId> = ast
            .children_of(module)
            .iter()
            .copied()
            .filter(|&c| matches!(ast.kind(c), NodeKind::Assignment(_)))
            .collect();
        assert_eq!(assignments.len(), 2);

        let names: Vec<(String, String)> = assignments
            .iter()
            .map(|&a| {
                let children = ast.children_of(a);
                let path = |id: NodeId| match ast.kind(id) {
                    NodeKind::IdentRef(r) => r.path[0].clone(),
                    _ => panic!("expected an IdentRef"),
                };
                (path(children[0]), path(children[1]))
            })
            .collect();
        assert_eq!(
            names,
            vec![
                ("m.p1$x".to_string(), "m.p2$x".to_string()),
                ("m.p1$y".to_string(), "m.p2$y".to_string())
            ]
        );
    }
}
