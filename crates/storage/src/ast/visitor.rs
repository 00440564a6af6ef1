use foundry_compilers::artifacts::{
    ContractDefinition, ContractDefinitionPart, EnumDefinition, SourceUnit, SourceUnitPart,
    StructDefinition, UserDefinedValueTypeDefinition, VariableDeclaration,
};
use paste::paste;

use crate::error::Result;

pub trait Visitor {
    fn visit_source_unit(&mut self, _source_unit: &SourceUnit) -> Result<()> {
        Ok(())
    }
    fn visit_contract_definition(&mut self, _definition: &ContractDefinition) -> Result<()> {
        Ok(())
    }
    fn visit_struct_definition(&mut self, _definition: &StructDefinition) -> Result<()> {
        Ok(())
    }
    fn visit_enum_definition(&mut self, _definition: &EnumDefinition) -> Result<()> {
        Ok(())
    }
    fn visit_user_defined_value_type(
        &mut self,
        _value_type: &UserDefinedValueTypeDefinition,
    ) -> Result<()> {
        Ok(())
    }
    fn visit_variable_declaration(&mut self, _declaration: &VariableDeclaration) -> Result<()> {
        Ok(())
    }

    fn post_visit_source_unit(&mut self, _source_unit: &SourceUnit) -> Result<()> {
        Ok(())
    }
    fn post_visit_contract_definition(&mut self, _definition: &ContractDefinition) -> Result<()> {
        Ok(())
    }
    fn post_visit_struct_definition(&mut self, _definition: &StructDefinition) -> Result<()> {
        Ok(())
    }
    fn post_visit_enum_definition(&mut self, _definition: &EnumDefinition) -> Result<()> {
        Ok(())
    }
    fn post_visit_user_defined_value_type(
        &mut self,
        _value_type: &UserDefinedValueTypeDefinition,
    ) -> Result<()> {
        Ok(())
    }
    fn post_visit_variable_declaration(
        &mut self,
        _declaration: &VariableDeclaration,
    ) -> Result<()> {
        Ok(())
    }
}

pub trait Walk {
    fn walk(&self, visitor: &mut dyn Visitor) -> Result<()>;
}

macro_rules! impl_walk {
    // Implement `Walk` for a type, calling the given function.
    ($ty:ty, | $val:ident, $visitor:ident | $e:expr) => {
        impl Walk for $ty {
            fn walk(&self, visitor: &mut dyn Visitor) -> Result<()> {
                let $val = self;
                let $visitor = visitor;
                $e
            }
        }
    };
    // Leaf nodes: visit and post-visit with nothing in between.
    ($ty:ty, $func:ident) => {
        impl_walk!($ty, |obj, visitor| {
            visitor.$func(obj)?;
            paste! { visitor.[<post_ $func>](obj)?; }
            Ok(())
        });
    };
    ($ty:ty, $func:ident, | $val:ident, $visitor:ident | $e:expr) => {
        impl_walk!($ty, |$val, $visitor| {
            $visitor.$func($val)?;
            $e?;
            paste! { $visitor.[<post_ $func>]($val)?; }
            Ok(())
        });
    };
}

impl_walk!(SourceUnit, visit_source_unit, |source_unit, visitor| {
    source_unit.nodes.iter().try_for_each(|node| node.walk(visitor))
});

// Nodes that never shape storage are pruned on load, the rest of the variants are skipped.
impl_walk!(SourceUnitPart, |part, visitor| {
    match part {
        SourceUnitPart::ContractDefinition(contract) => contract.walk(visitor),
        SourceUnitPart::StructDefinition(struct_) => struct_.walk(visitor),
        SourceUnitPart::EnumDefinition(enum_) => enum_.walk(visitor),
        SourceUnitPart::UserDefinedValueTypeDefinition(value_type) => value_type.walk(visitor),
        SourceUnitPart::VariableDeclaration(declaration) => declaration.walk(visitor),
        _ => Ok(()),
    }
});

impl_walk!(ContractDefinition, visit_contract_definition, |contract, visitor| {
    contract.nodes.iter().try_for_each(|part| part.walk(visitor))
});

impl_walk!(ContractDefinitionPart, |part, visitor| {
    match part {
        ContractDefinitionPart::VariableDeclaration(declaration) => declaration.walk(visitor),
        ContractDefinitionPart::StructDefinition(struct_) => struct_.walk(visitor),
        ContractDefinitionPart::EnumDefinition(enum_) => enum_.walk(visitor),
        ContractDefinitionPart::UserDefinedValueTypeDefinition(value_type) => {
            value_type.walk(visitor)
        }
        _ => Ok(()),
    }
});

impl_walk!(StructDefinition, visit_struct_definition, |struct_, visitor| {
    struct_.members.iter().try_for_each(|member| member.walk(visitor))
});

impl_walk!(EnumDefinition, visit_enum_definition);
impl_walk!(UserDefinedValueTypeDefinition, visit_user_defined_value_type);
impl_walk!(VariableDeclaration, visit_variable_declaration);
